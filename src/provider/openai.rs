//! OpenAI chat-completions backend.
//!
//! Also serves OpenAI-compatible gateways (Qwen, Moonshot and friends) via
//! [`crate::config::ProviderConfig::base_url`], which is why the vision
//! fragment list knows about more than OpenAI's own model names.

use super::{
    build_http_client, encode_image_base64, mime_for_path, model_matches, ChatMessage,
    ChatOptions, ChatProvider, ProviderResponse, TokenUsage,
};
use crate::config::ProviderConfig;
use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const BACKEND: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Vision-capable name fragments across the families served through
/// OpenAI-compatible endpoints.
const VISION_FRAGMENTS: &[&str] = &["gpt-4", "qwen-vl", "qwen2-vl", "glm-4v", "glm4v", "vision"];

/// (model, input USD per 1M tokens, output USD per 1M tokens).
const PRICING: &[(&str, f64, f64)] = &[("gpt-4o", 5.0, 15.0), ("gpt-4o-mini", 0.15, 0.6)];

/// Models missing from the table are billed at the gpt-4o-mini tier.
const FALLBACK_PRICING: (f64, f64) = (0.15, 0.6);

#[derive(Debug)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractError::MissingApiKey {
                backend: BACKEND.to_string(),
            });
        }
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Translate neutral messages into the chat-completions shape: the text
    /// part first, then one `image_url` part per image as a `data:` URI.
    /// Text-only messages stay plain strings.
    fn convert_messages(&self, messages: &[ChatMessage]) -> Result<Vec<WireMessage>> {
        let mut wire = Vec::with_capacity(messages.len());
        for msg in messages {
            if msg.images.is_empty() {
                wire.push(WireMessage {
                    role: msg.role.as_str(),
                    content: WireContent::Text(msg.content.clone()),
                });
                continue;
            }

            let mut parts = Vec::with_capacity(msg.images.len() + 1);
            if !msg.content.is_empty() {
                parts.push(WirePart::Text {
                    text: msg.content.clone(),
                });
            }
            for path in &msg.images {
                let data = encode_image_base64(path)?;
                parts.push(WirePart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", mime_for_path(path), data),
                    },
                });
            }
            wire.push(WireMessage {
                role: msg.role.as_str(),
                content: WireContent::Parts(parts),
            });
        }
        Ok(wire)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    fn supports_vision(&self) -> bool {
        model_matches(&self.model, VISION_FRAGMENTS)
    }

    fn estimate_cost(&self, usage: &TokenUsage) -> f64 {
        let (input, output) = PRICING
            .iter()
            .find(|(m, _, _)| *m == self.model)
            .map(|(_, i, o)| (*i, *o))
            .unwrap_or(FALLBACK_PRICING);
        (usage.prompt_tokens as f64 / 1_000_000.0) * input
            + (usage.completion_tokens as f64 / 1_000_000.0) * output
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ProviderResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages: self.convert_messages(messages)?,
            temperature: options.temperature.unwrap_or(0.7),
            max_tokens: options.max_tokens.unwrap_or(2048),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::Transport {
                backend: BACKEND.to_string(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                backend: BACKEND.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let raw: Value = resp.json().await.map_err(|e| ExtractError::Transport {
            backend: BACKEND.to_string(),
            source: e,
        })?;
        let parsed: ChatResponse =
            serde_json::from_value(raw.clone()).map_err(|e| ExtractError::MalformedResponse {
                backend: BACKEND.to_string(),
                detail: e.to_string(),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::MalformedResponse {
                backend: BACKEND.to_string(),
                detail: "response carried no choices".to_string(),
            })?
            .message
            .content
            .unwrap_or_default();

        let usage = parsed.usage.unwrap_or_default();
        let usage = TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        };
        debug!(
            "openai response: model={}, {}",
            parsed.model.as_deref().unwrap_or(&self.model),
            usage
        );

        Ok(ProviderResponse {
            content,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage,
            raw: Some(raw),
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn provider(model: &str) -> OpenAiProvider {
        OpenAiProvider::new(&ProviderConfig::new("openai", "sk-test").with_model(model)).unwrap()
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = OpenAiProvider::new(&ProviderConfig::new("openai", "  ")).unwrap_err();
        assert!(matches!(err, ExtractError::MissingApiKey { .. }));
    }

    #[test]
    fn known_model_pricing() {
        let p = provider("gpt-4o");
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
            total_tokens: 2_000_000,
        };
        assert!((p.estimate_cost(&usage) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_uses_mini_pricing() {
        let p = provider("qwen-vl-plus");
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
            total_tokens: 2_000_000,
        };
        assert!((p.estimate_cost(&usage) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn vision_follows_model_name() {
        assert!(provider("gpt-4o-mini").supports_vision());
        assert!(provider("qwen2-vl-72b").supports_vision());
        assert!(provider("moonshot-v1-8k-vision-preview").supports_vision());
        assert!(!provider("gpt-3.5-turbo").supports_vision());
    }

    #[test]
    fn text_only_message_stays_a_plain_string() {
        let p = provider("gpt-4o-mini");
        let wire = p
            .convert_messages(&[ChatMessage::system("be terse"), ChatMessage::user("hi")])
            .unwrap();
        let v = serde_json::to_value(&wire).unwrap();
        assert_eq!(v[0]["role"], "system");
        assert_eq!(v[0]["content"], "be terse");
        assert_eq!(v[1]["content"], "hi");
    }

    #[test]
    fn image_message_puts_text_part_first_with_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("page.png");
        fs::write(&img, b"not-really-png").unwrap();

        let p = provider("gpt-4o");
        let wire = p
            .convert_messages(&[ChatMessage::user_with_images("describe", vec![img])])
            .unwrap();
        let v = serde_json::to_value(&wire).unwrap();

        let parts = v[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["type"], "image_url");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
