//! Unified chat interface over multiple LLM backends.
//!
//! Every backend implements [`ChatProvider`]: it receives the same
//! [`ChatMessage`] list and translates it into its native wire shape. The
//! differences between backends are real and load-bearing, not cosmetic:
//!
//! * **OpenAI** takes a plain `messages` array and wants images as
//!   `data:<mime>;base64,...` URIs, text part first.
//! * **Claude** takes the system prompt as a top-level parameter, not a
//!   message, and wants images as typed base64 source blocks.
//! * **Zhipu GLM** rejects a standalone system role in multimodal turns
//!   (the prompt is folded into the first user message) and wants the bare
//!   base64 string with no `data:` prefix, image parts before the text.
//!
//! Callers never see any of this; they build role/text/image messages and
//! get back a [`ProviderResponse`] with token usage for cost accounting.

pub mod claude;
pub mod factory;
pub mod mock;
pub mod openai;
pub mod zhipu;

pub use factory::ProviderFactory;

use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Message model ───────────────────────────────────────────────────────────

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation, in backend-neutral form.
///
/// Images are carried as file paths and only read and base64-encoded at send
/// time, so a message list is cheap to build and clone.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub images: Vec<PathBuf>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(content: impl Into<String>, images: Vec<PathBuf>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            images,
        }
    }
}

/// Per-call sampling knobs. `None` leaves the backend default in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Token counters reported by the backend for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt={} completion={} total={}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// Normalized result of one chat call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Assistant text, first candidate only.
    pub content: String,
    /// Model name as reported by the backend, not as requested.
    pub model: String,
    pub usage: TokenUsage,
    /// Full backend payload, kept for diagnostics.
    pub raw: Option<serde_json::Value>,
}

// ── Provider contract ───────────────────────────────────────────────────────

/// A chat-completion backend.
///
/// Implementations hold their resolved model name and credentials; one
/// instance serves one configuration for its whole lifetime.
#[async_trait]
pub trait ChatProvider: fmt::Debug + Send + Sync {
    /// Stable backend key, as understood by [`ProviderFactory`].
    fn backend(&self) -> &'static str;

    /// The model this instance sends requests for.
    fn model(&self) -> &str;

    /// The model used when the configuration names none.
    fn default_model(&self) -> &'static str;

    /// Whether [`Self::model`] accepts image input. Decided by name
    /// pattern, not by a probe call; the fragments differ per backend.
    fn supports_vision(&self) -> bool;

    /// Estimated cost of one completed call in USD. Backends quoting
    /// another currency convert at a fixed documented rate.
    fn estimate_cost(&self, usage: &TokenUsage) -> f64;

    /// Send one chat request and wait for the full response.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ProviderResponse>;
}

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Read an image file and base64-encode its bytes (standard alphabet).
pub(crate) fn encode_image_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::AssetIo {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(BASE64.encode(bytes))
}

/// Media type from the file extension. Unknown extensions report JPEG,
/// which every backend tolerates for the formats page renderers emit.
pub(crate) fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/jpeg",
    }
}

/// Case-insensitive substring match of a model name against known
/// vision-capable name fragments.
pub(crate) fn model_matches(model: &str, fragments: &[&str]) -> bool {
    let model = model.to_ascii_lowercase();
    fragments.iter().any(|f| model.contains(f))
}

/// Build the HTTP client a provider will use for its lifetime.
pub(crate) fn build_http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| ExtractError::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_falls_back_to_jpeg() {
        assert_eq!(mime_for_path(Path::new("page.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("scan.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("anim.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("mystery.tiff")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("no_extension")), "image/jpeg");
    }

    #[test]
    fn model_fragment_match_is_case_insensitive() {
        assert!(model_matches("GPT-4o-mini", &["gpt-4"]));
        assert!(model_matches("Qwen-VL-Plus", &["qwen-vl"]));
        assert!(!model_matches("gpt-3.5-turbo", &["gpt-4", "vision"]));
    }

    #[test]
    fn usage_displays_all_three_counters() {
        let u = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
        };
        assert_eq!(u.to_string(), "prompt=1000 completion=500 total=1500");
    }
}
