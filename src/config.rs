//! Configuration types for exam extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across runs and diff two runs to understand
//! why their outputs differ.
//!
//! There is no implicit process-wide state: the library never reads
//! environment variables or global settings. Callers load credentials however
//! they like and pass them in through [`ProviderConfig`].

use crate::error::ExtractError;
use std::fmt;
use std::path::PathBuf;

/// Which LLM backend to talk to and how to authenticate.
///
/// The `backend` string is resolved case-insensitively by
/// [`crate::provider::ProviderFactory`]; an unknown name fails construction
/// with [`ExtractError::UnknownBackend`].
#[derive(Clone)]
pub struct ProviderConfig {
    /// Backend key: `"openai"`, `"claude"`, `"zhipu"`, or `"mock"`.
    pub backend: String,

    /// API credential for the backend. Never logged.
    pub api_key: String,

    /// Model override. `None` uses the backend's default model
    /// (e.g. `gpt-4o-mini` for OpenAI, `glm-4v` for Zhipu).
    pub model: Option<String>,

    /// Base URL override for OpenAI-compatible gateways. Ignored by
    /// backends with a fixed endpoint.
    pub base_url: Option<String>,

    /// Per-request timeout in seconds. `None` means no client-side timeout;
    /// a hung call then blocks the pipeline until the OS gives up.
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Create a provider configuration for the given backend and credential.
    pub fn new(backend: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            api_key: api_key.into(),
            model: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    /// Override the backend's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Point an OpenAI-compatible backend at a different gateway.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Apply a client-side request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("backend", &self.backend)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for a question-extraction run.
///
/// Built via [`ExtractionConfig::builder()`].
///
/// # Example
/// ```rust
/// use exam_extract::{ExtractionConfig, ProviderConfig};
///
/// let config = ExtractionConfig::builder(ProviderConfig::new("zhipu", "sk-..."))
///     .batch_threshold(3000)
///     .crop_padding(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Backend selection and credentials.
    pub provider: ProviderConfig,

    /// Byte length above which bulk text is split into batches.
    /// Default: 3000.
    ///
    /// Each batch becomes one independent API call, so the threshold trades
    /// per-call token cost against the number of round-trips. Batches are cut
    /// at line boundaries, never mid-line, so a question is unlikely to be
    /// severed across two calls.
    pub batch_threshold: usize,

    /// Sampling temperature for extraction calls. Default: 0.3.
    ///
    /// Low temperature keeps the model faithful to what is actually on the
    /// page; higher values introduce paraphrasing that corrupts question text.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 16000.
    ///
    /// A dense exam page can carry a dozen questions with options and
    /// explanations; a low ceiling silently truncates the JSON array
    /// mid-element, leaving the repair pipeline to salvage what it can.
    pub max_tokens: u32,

    /// Directory where cropped figure assets are written.
    /// Default: `static/images/questions`.
    ///
    /// Keeping `static` in the path lets [`crate::crop::ImageCropper`]
    /// derive the public URL for each asset by rebasing at that segment.
    pub asset_dir: PathBuf,

    /// Margin in pixels added around every figure bounding box before
    /// cropping, clamped to the page image bounds. Default: 10.
    pub crop_padding: u32,
}

impl ExtractionConfig {
    /// Create a configuration with default knobs for the given provider.
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            batch_threshold: 3000,
            temperature: 0.3,
            max_tokens: 16000,
            asset_dir: PathBuf::from("static/images/questions"),
            crop_padding: 10,
        }
    }

    /// Create a new builder seeded with default values.
    pub fn builder(provider: ProviderConfig) -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::new(provider),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn batch_threshold(mut self, bytes: usize) -> Self {
        self.config.batch_threshold = bytes;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.asset_dir = dir.into();
        self
    }

    pub fn crop_padding(mut self, px: u32) -> Self {
        self.config.crop_padding = px;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.provider.backend.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Provider backend name must not be empty".into(),
            ));
        }
        if c.batch_threshold == 0 {
            return Err(ExtractError::InvalidConfig(
                "Batch threshold must be at least 1 byte".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be at least 1".into(),
            ));
        }
        if c.asset_dir.as_os_str().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Asset directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
