//! Error types for the exam-extract library.
//!
//! One enum, [`ExtractError`], covers two distinct failure classes:
//!
//! * **Fail-fast**: configuration problems (unknown backend, missing API
//!   key, vision extraction against a text-only model). These are raised
//!   *before* any network call is attempted, so a misconfigured run dies
//!   immediately instead of after the first expensive API round-trip.
//!
//! * **Propagated**: transport and API failures from the backend itself.
//!   These surface to the caller unmodified; the library never retries
//!   internally, so callers keep full control over backoff policy.
//!
//! Malformed *model output* is deliberately not an error at all: the repair
//! pipeline in [`crate::extract`] logs it and yields an empty question list,
//! because one bad page must never abort a multi-page run. Per-figure crop
//! failures are handled the same way inside [`crate::crop`].

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// All errors returned by the exam-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The configured backend name matched no registered provider.
    #[error("Unknown LLM backend '{name}'. Supported backends: {known}")]
    UnknownBackend { name: String, known: String },

    /// A provider was constructed without a credential.
    #[error("Missing API key for backend '{backend}'.\nSet ProviderConfig::api_key before building the extractor.")]
    MissingApiKey { backend: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Page-vision extraction was requested but the configured model cannot
    /// accept image input. Raised before any network call.
    #[error("Model '{model}' on backend '{backend}' does not support vision input.\nSwitch to a vision-capable model such as '{hint}'.")]
    VisionUnsupported {
        backend: String,
        model: String,
        hint: String,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The backend replied with a non-2xx status.
    #[error("LLM API error from '{backend}' (HTTP {status}): {message}")]
    Api {
        backend: String,
        status: u16,
        message: String,
    },

    /// The request never produced a usable HTTP response.
    #[error("Network error talking to '{backend}': {source}")]
    Transport {
        backend: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend replied 2xx but the body is structurally unusable
    /// (missing choices, empty content, invalid JSON).
    #[error("Unusable response from '{backend}': {detail}")]
    MalformedResponse { backend: String, detail: String },

    // ── Asset errors ──────────────────────────────────────────────────────
    /// An image could not be decoded or encoded.
    #[error("Failed to process image '{}': {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Filesystem I/O on an asset path failed.
    #[error("Asset I/O failed for '{}': {source}", .path.display())]
    AssetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bounding box clamped to the source image left nothing to crop.
    #[error("Bounding box produced an empty crop window: {detail}")]
    EmptyCropWindow { detail: String },
}
