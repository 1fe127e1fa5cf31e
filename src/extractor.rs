//! Extraction orchestrator: the primary entry point of the library.
//!
//! [`QuestionExtractor`] owns one provider instance and one running cost
//! total for its lifetime. It offers three extraction modes, all funneling
//! through the same chat/repair/parse path:
//!
//! - **Bulk text**: long text is split at line boundaries and each batch
//!   becomes one call; results concatenate in batch order.
//! - **Single image**: one cropped or photographed exercise, with optional
//!   surrounding-text context.
//! - **Page image**: one rendered page; the model reports figure bounding
//!   boxes and every record is stamped with the page number afterwards.
//!
//! Calls run strictly sequentially, one in flight at a time. Errors from the
//! provider propagate unmodified; there is no retry layer here. The vision
//! modes check model capability *before* any network call, so a misconfigured
//! model fails fast instead of burning a request.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Result};
use crate::extract::batch::split_batches;
use crate::extract::parser::parse_questions;
use crate::prompts;
use crate::provider::{ChatMessage, ChatOptions, ChatProvider, ProviderFactory};
use crate::record::ExtractedQuestion;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct QuestionExtractor {
    provider: Arc<dyn ChatProvider>,
    config: ExtractionConfig,
    total_cost: f64,
}

impl QuestionExtractor {
    /// Build an extractor, constructing the provider named in the
    /// configuration.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let provider = ProviderFactory::create(&config.provider)?;
        Ok(Self::with_provider(provider, config))
    }

    /// Build an extractor around an already-constructed provider. Used by
    /// tests and by callers that wrap providers in their own middleware.
    pub fn with_provider(provider: Arc<dyn ChatProvider>, config: ExtractionConfig) -> Self {
        Self {
            provider,
            config,
            total_cost: 0.0,
        }
    }

    /// Estimated USD spent across all calls made by this instance.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// The provider this extractor sends requests through.
    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Extract questions from bulk text, batching long input.
    pub async fn extract_from_text(&mut self, text: &str) -> Result<Vec<ExtractedQuestion>> {
        let batches = split_batches(text, self.config.batch_threshold);
        if batches.len() > 1 {
            info!(
                "Input is {} bytes; processing in {} batches",
                text.len(),
                batches.len()
            );
        }

        let mut questions = Vec::new();
        for (i, batch) in batches.iter().enumerate() {
            if batches.len() > 1 {
                info!("Batch {}/{} ({} bytes)", i + 1, batches.len(), batch.len());
            }
            let mut found = self.extract_single_batch(batch).await?;
            if batches.len() > 1 {
                info!("Batch {}/{} yielded {} questions", i + 1, batches.len(), found.len());
            }
            questions.append(&mut found);
        }
        Ok(questions)
    }

    /// Extract questions from a single exercise image, optionally with
    /// surrounding text for context.
    pub async fn extract_from_image(
        &mut self,
        image: &Path,
        context: Option<&str>,
    ) -> Result<Vec<ExtractedQuestion>> {
        self.ensure_vision()?;

        let messages = vec![
            ChatMessage::system(prompts::IMAGE_SYSTEM_PROMPT),
            ChatMessage::user_with_images(
                prompts::image_extraction_prompt(context),
                vec![image.to_path_buf()],
            ),
        ];
        let content = self.send(messages).await?;
        Ok(parse_questions(&content))
    }

    /// Extract every question from one rendered page image, including figure
    /// bounding boxes. Each returned record is stamped with `page_number`.
    pub async fn extract_from_page_image(
        &mut self,
        image: &Path,
        page_number: u32,
    ) -> Result<Vec<ExtractedQuestion>> {
        self.ensure_vision()?;

        let messages = vec![
            ChatMessage::system(prompts::PAGE_VISION_SYSTEM_PROMPT),
            ChatMessage::user_with_images(
                prompts::page_vision_prompt(page_number),
                vec![image.to_path_buf()],
            ),
        ];
        let content = self.send(messages).await?;

        let mut questions = parse_questions(&content);
        // Stamped here, never requested of the model.
        for q in &mut questions {
            q.page_number = Some(page_number);
        }
        info!("Page {}: extracted {} questions", page_number, questions.len());
        Ok(questions)
    }

    async fn extract_single_batch(&mut self, batch: &str) -> Result<Vec<ExtractedQuestion>> {
        let messages = vec![
            ChatMessage::system(prompts::TEXT_SYSTEM_PROMPT),
            ChatMessage::user(prompts::text_extraction_prompt(batch)),
        ];
        let content = self.send(messages).await?;
        Ok(parse_questions(&content))
    }

    /// One chat round trip with cost accounting.
    async fn send(&mut self, messages: Vec<ChatMessage>) -> Result<String> {
        let options = ChatOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
        };
        let response = self.provider.chat(&messages, &options).await?;

        let cost = self.provider.estimate_cost(&response.usage);
        self.total_cost += cost;
        debug!(
            "Call cost ${:.4}, running total ${:.4} ({})",
            cost, self.total_cost, response.usage
        );
        Ok(response.content)
    }

    /// Fail fast before any network call when the configured model cannot
    /// accept image input.
    fn ensure_vision(&self) -> Result<()> {
        if self.provider.supports_vision() {
            return Ok(());
        }
        Err(ExtractError::VisionUnsupported {
            backend: self.provider.backend().to_string(),
            model: self.provider.model().to_string(),
            hint: vision_hint(self.provider.backend()).to_string(),
        })
    }
}

fn vision_hint(backend: &str) -> &'static str {
    match backend {
        "openai" => "gpt-4o",
        "zhipu" => "glm-4v",
        _ => "gpt-4o, glm-4v, or qwen-vl-plus",
    }
}
