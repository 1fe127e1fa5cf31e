//! Anthropic Claude backend, against the Messages API.
//!
//! Two shape differences from the OpenAI family: the system prompt is a
//! top-level request parameter rather than a message, and images travel as
//! typed base64 source blocks with an explicit media type.

use super::{
    build_http_client, encode_image_base64, mime_for_path, ChatMessage, ChatOptions,
    ChatProvider, ChatRole, ProviderResponse, TokenUsage,
};
use crate::config::ProviderConfig;
use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const BACKEND: &str = "claude";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// (model, input USD per 1M tokens, output USD per 1M tokens).
const PRICING: &[(&str, f64, f64)] = &[
    ("claude-3-5-sonnet-20241022", 3.0, 15.0),
    ("claude-3-5-haiku-20241022", 1.0, 5.0),
];

/// Models missing from the table are billed at the Sonnet tier.
const FALLBACK_PRICING: (f64, f64) = (3.0, 15.0);

#[derive(Debug)]
pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractError::MissingApiKey {
                backend: BACKEND.to_string(),
            });
        }
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn build_request<'a>(
        &'a self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatRequest<'a>> {
        // The first system message becomes the top-level system parameter;
        // any further system messages are dropped by conversion below.
        let system = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone());

        Ok(ChatRequest {
            model: &self.model,
            max_tokens: options.max_tokens.unwrap_or(2048),
            temperature: options.temperature.unwrap_or(0.7),
            system,
            messages: self.convert_messages(messages)?,
        })
    }

    /// Translate neutral messages into content-block form: the text block
    /// first, then one image block per attachment.
    fn convert_messages(&self, messages: &[ChatMessage]) -> Result<Vec<WireMessage>> {
        let mut wire = Vec::new();
        for msg in messages {
            if msg.role == ChatRole::System {
                continue;
            }
            let mut blocks = Vec::with_capacity(msg.images.len() + 1);
            if !msg.content.is_empty() {
                blocks.push(WireBlock::Text {
                    text: msg.content.clone(),
                });
            }
            for path in &msg.images {
                blocks.push(WireBlock::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: mime_for_path(path),
                        data: encode_image_base64(path)?,
                    },
                });
            }
            wire.push(WireMessage {
                role: msg.role.as_str(),
                content: blocks,
            });
        }
        Ok(wire)
    }
}

#[async_trait]
impl ChatProvider for ClaudeProvider {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    /// Every model this backend serves accepts image input.
    fn supports_vision(&self) -> bool {
        true
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
        let request = self.build_request(messages, options)?;

        let resp = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
        let parsed: MessagesResponse =
            serde_json::from_value(raw.clone()).map_err(|e| ExtractError::MalformedResponse {
                backend: BACKEND.to_string(),
                detail: e.to_string(),
            })?;

        let content = parsed
            .content
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::MalformedResponse {
                backend: BACKEND.to_string(),
                detail: "response carried no content blocks".to_string(),
            })?
            .text
            .unwrap_or_default();

        let wire_usage = parsed.usage.unwrap_or_default();
        let usage = TokenUsage {
            prompt_tokens: wire_usage.input_tokens,
            completion_tokens: wire_usage.output_tokens,
            total_tokens: wire_usage.input_tokens + wire_usage.output_tokens,
        };
        debug!(
            "claude response: model={}, {}",
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
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn provider(model: &str) -> ClaudeProvider {
        ClaudeProvider::new(&ProviderConfig::new("claude", "ak-test").with_model(model)).unwrap()
    }

    #[test]
    fn system_message_becomes_top_level_param() {
        let p = provider(DEFAULT_MODEL);
        let req = p
            .build_request(
                &[ChatMessage::system("Be brief."), ChatMessage::user("Hello")],
                &ChatOptions {
                    temperature: Some(0.3),
                    max_tokens: Some(16000),
                },
            )
            .unwrap();
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["system"], "Be brief.");
        assert_eq!(v["max_tokens"], 16000);
        let msgs = v["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["role"], "user");
        // Content is always block form, even for plain text.
        assert_eq!(msgs[0]["content"][0]["type"], "text");
        assert_eq!(msgs[0]["content"][0]["text"], "Hello");
    }

    #[test]
    fn no_system_message_omits_the_param() {
        let p = provider(DEFAULT_MODEL);
        let req = p
            .build_request(&[ChatMessage::user("Hi")], &ChatOptions::default())
            .unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("system").is_none());
    }

    #[test]
    fn image_blocks_follow_the_text_block() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("figure.jpg");
        fs::write(&img, b"jpeg-bytes").unwrap();

        let p = provider(DEFAULT_MODEL);
        let wire = p
            .convert_messages(&[ChatMessage::user_with_images("what is this", vec![img])])
            .unwrap();
        let v = serde_json::to_value(&wire).unwrap();

        let blocks = v[0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "image");
        assert_eq!(blocks[1]["source"]["type"], "base64");
        assert_eq!(blocks[1]["source"]["media_type"], "image/jpeg");
        assert!(!blocks[1]["source"]["data"].as_str().unwrap().is_empty());
    }

    #[test]
    fn pricing_with_sonnet_fallback() {
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
            total_tokens: 2_000_000,
        };
        assert!((provider("claude-3-5-haiku-20241022").estimate_cost(&usage) - 6.0).abs() < 1e-9);
        // Unknown model bills at the Sonnet tier.
        assert!((provider("claude-9-experimental").estimate_cost(&usage) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn vision_is_always_available() {
        assert!(provider("claude-3-5-haiku-20241022").supports_vision());
    }
}
