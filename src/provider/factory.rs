//! Backend selection by name.

use super::claude::ClaudeProvider;
use super::mock::MockProvider;
use super::openai::OpenAiProvider;
use super::zhipu::ZhipuProvider;
use super::ChatProvider;
use crate::config::ProviderConfig;
use crate::error::{ExtractError, Result};
use std::sync::Arc;

/// Maps a backend key to a constructed [`ChatProvider`].
///
/// Keys are matched case-insensitively. An unknown key is a configuration
/// error that names the supported backends, never a silent default.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Backend keys [`Self::create`] understands.
    pub const BACKENDS: &'static [&'static str] = &["claude", "mock", "openai", "zhipu"];

    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn ChatProvider>> {
        match config.backend.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Arc::new(ClaudeProvider::new(config)?)),
            "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
            "zhipu" => Ok(Arc::new(ZhipuProvider::new(config)?)),
            "mock" => Ok(Arc::new(MockProvider::new())),
            _ => Err(ExtractError::UnknownBackend {
                name: config.backend.clone(),
                known: Self::BACKENDS.join(", "),
            }),
        }
    }
}
