//! Deterministic in-process backend for tests and dry runs.
//!
//! Responses are scripted up front and handed out in order; once the script
//! is drained every further call answers with an empty `questions` envelope
//! so over-calling shows up as missing data, not a panic.

use super::{ChatMessage, ChatOptions, ChatProvider, ProviderResponse, TokenUsage};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const BACKEND: &str = "mock";
const MODEL: &str = "mock-model";
const EMPTY_ENVELOPE: &str = r#"{"questions": []}"#;

/// Fixed USD pricing per 1M tokens, chosen to make cost assertions easy.
const INPUT_PRICE: f64 = 5.0;
const OUTPUT_PRICE: f64 = 15.0;

/// Every call reports the same usage: 1000 prompt + 500 completion tokens.
const USAGE: TokenUsage = TokenUsage {
    prompt_tokens: 1000,
    completion_tokens: 500,
    total_tokens: 1500,
};

#[derive(Debug)]
pub struct MockProvider {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    vision: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::scripted(Vec::<String>::new())
    }

    /// A provider that answers the given responses in order.
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
            vision: true,
        }
    }

    /// Toggle the vision capability this mock reports.
    pub fn with_vision(mut self, vision: bool) -> Self {
        self.vision = vision;
        self
    }

    /// Queue one more scripted response.
    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(response.into());
        }
    }

    /// How many chat calls reached this provider.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn model(&self) -> &str {
        MODEL
    }

    fn default_model(&self) -> &'static str {
        MODEL
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    fn estimate_cost(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 / 1_000_000.0) * INPUT_PRICE
            + (usage.completion_tokens as f64 / 1_000_000.0) * OUTPUT_PRICE
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| EMPTY_ENVELOPE.to_string());

        Ok(ProviderResponse {
            content,
            model: MODEL.to_string(),
            usage: USAGE,
            raw: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[test]
    fn scripted_responses_come_back_in_order() {
        let mock = MockProvider::scripted(["first", "second"]);
        run(async {
            let opts = ChatOptions::default();
            let msgs = [ChatMessage::user("q")];
            assert_eq!(mock.chat(&msgs, &opts).await.unwrap().content, "first");
            assert_eq!(mock.chat(&msgs, &opts).await.unwrap().content, "second");
            // Drained script falls back to the empty envelope.
            assert_eq!(
                mock.chat(&msgs, &opts).await.unwrap().content,
                r#"{"questions": []}"#
            );
        });
        assert_eq!(mock.calls(), 3);
    }

    #[test]
    fn per_call_cost_is_fixed() {
        let mock = MockProvider::new();
        // 1000 prompt at $5/M plus 500 completion at $15/M
        assert!((mock.estimate_cost(&USAGE) - 0.0125).abs() < 1e-12);
    }
}
