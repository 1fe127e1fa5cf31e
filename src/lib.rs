//! # exam-extract
//!
//! Extract structured exam questions from documents using LLMs.
//!
//! ## Why this crate?
//!
//! Exam papers bury their structure in layout: numbered stems, lettered
//! options, answer keys and explanations scattered across columns, figures
//! referenced mid-sentence. Regex pipelines splinter on every new paper
//! format. Instead this crate hands the raw text (or a rendered page image)
//! to a language model with a strict JSON contract, then repairs and parses
//! whatever comes back into typed records, tolerating the fenced blocks,
//! stray comments, trailing commas and truncated output that real models
//! produce.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text or page image
//!  │
//!  ├─ 1. Batch    long text split at line boundaries
//!  ├─ 2. Prompt   mode-specific system + task prompts
//!  ├─ 3. Chat     one provider call per batch (openai / claude / zhipu)
//!  ├─ 4. Repair   fences, comments, trailing commas, truncation
//!  ├─ 5. Parse    tolerant per-element decoding into records
//!  └─ 6. Crop     page figures → content-addressed PNG assets
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam_extract::{ExtractionConfig, ProviderConfig, QuestionExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_key = std::env::var("OPENAI_API_KEY")?;
//!     let provider = ProviderConfig::new("openai", api_key).with_model("gpt-4o");
//!     let mut extractor = QuestionExtractor::new(ExtractionConfig::new(provider))?;
//!
//!     let text = std::fs::read_to_string("exam.txt")?;
//!     let questions = extractor.extract_from_text(&text).await?;
//!     for q in &questions {
//!         println!("[{}] {}", q.question_type, q.question_text);
//!     }
//!     eprintln!("estimated cost: ${:.4}", extractor.total_cost());
//!     Ok(())
//! }
//! ```
//!
//! ## Choosing a Backend
//!
//! | Backend  | Default model | Vision | Notes |
//! |----------|---------------|--------|-------|
//! | `openai` | `gpt-4o-mini` | per model | custom `base_url` reaches compatible gateways |
//! | `claude` | `claude-3-5-sonnet-20241022` | always | |
//! | `zhipu`  | `glm-4v` | per model | CNY pricing, reported in USD |
//! | `mock`   | `mock-model` | configurable | scripted responses for tests |
//!
//! Page-vision extraction (figure bounding boxes) needs a vision-capable
//! model; the extractor refuses up front otherwise.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod crop;
pub mod error;
pub mod extract;
pub mod extractor;
pub mod prompts;
pub mod provider;
pub mod record;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ProviderConfig};
pub use crop::{CroppedAsset, ImageCropper};
pub use error::{ExtractError, Result};
pub use extract::parser::parse_questions;
pub use extract::repair::repair_json;
pub use extractor::QuestionExtractor;
pub use provider::mock::MockProvider;
pub use provider::{
    ChatMessage, ChatOptions, ChatProvider, ChatRole, ProviderFactory, ProviderResponse,
    TokenUsage,
};
pub use record::{BoundingBox, Difficulty, ExtractedOption, ExtractedQuestion, QuestionType};
pub use store::{MemorySink, QuestionSink, SavedSource};
