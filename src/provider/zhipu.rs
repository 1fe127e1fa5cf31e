//! Zhipu GLM backend, against the native bigmodel.cn endpoint.
//!
//! The wire shape is OpenAI-compatible but the rules are not:
//!
//! * A standalone system role is rejected on multimodal turns. The first
//!   system message is folded into the first user message instead.
//! * Within a multimodal content list, image parts must come before the
//!   text part.
//! * Images are the bare base64 string in `url`, no `data:` URI prefix.
//! * `max_tokens` is never sent; the endpoint rejects out-of-range values
//!   with error 1210 and otherwise defaults to the model maximum.

use super::{
    build_http_client, encode_image_base64, model_matches, ChatMessage, ChatOptions,
    ChatProvider, ChatRole, ProviderResponse, TokenUsage,
};
use crate::config::ProviderConfig;
use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const BACKEND: &str = "zhipu";
const API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const DEFAULT_MODEL: &str = "glm-4v";

const VISION_FRAGMENTS: &[&str] = &["glm-4v", "glm4v"];

/// (model, input CNY per 1K tokens, output CNY per 1K tokens).
const PRICING: &[(&str, f64, f64)] = &[
    ("glm-4v", 0.01, 0.03),
    ("glm-4v-plus", 0.05, 0.15),
    ("glm-4v-flash", 0.0, 0.0),
];

/// Models missing from the table are billed at the glm-4v tier.
const FALLBACK_PRICING: (f64, f64) = (0.01, 0.03);

/// Fixed conversion rate used to report costs in USD like every other
/// backend.
const CNY_PER_USD: f64 = 7.0;

/// GLM's sampling default; sending it back explicitly is redundant and the
/// endpoint is picky about extra parameters.
const GLM_DEFAULT_TEMPERATURE: f32 = 0.95;

#[derive(Debug)]
pub struct ZhipuProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ZhipuProvider {
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
        let temperature = options.temperature.unwrap_or(0.7);
        Ok(ChatRequest {
            model: &self.model,
            messages: self.convert_messages(messages)?,
            temperature: if (temperature - GLM_DEFAULT_TEMPERATURE).abs() < f32::EPSILON {
                None
            } else {
                Some(temperature)
            },
        })
    }

    /// Translate neutral messages into GLM's shape, folding the first system
    /// prompt into the first user turn and emitting image parts before text.
    fn convert_messages(&self, messages: &[ChatMessage]) -> Result<Vec<WireMessage>> {
        let mut system_prompt = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone());

        let mut wire: Vec<WireMessage> = Vec::new();
        for msg in messages {
            if msg.role == ChatRole::System {
                continue;
            }
            let fold_here = wire.is_empty() && msg.role == ChatRole::User;

            if msg.images.is_empty() {
                let mut content = msg.content.clone();
                if fold_here {
                    if let Some(sys) = system_prompt.take() {
                        content = format!("{}\n\n{}", sys, content);
                    }
                }
                wire.push(WireMessage {
                    role: msg.role.as_str(),
                    content: WireContent::Text(content),
                });
                continue;
            }

            let mut parts = Vec::with_capacity(msg.images.len() + 1);
            for path in &msg.images {
                parts.push(WirePart::ImageUrl {
                    image_url: ImageUrl {
                        url: encode_image_base64(path)?,
                    },
                });
            }
            if !msg.content.is_empty() {
                let mut text = msg.content.clone();
                if fold_here {
                    if let Some(sys) = system_prompt.take() {
                        text = format!("{}\n\n{}", sys, text);
                    }
                }
                parts.push(WirePart::Text { text });
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
impl ChatProvider for ZhipuProvider {
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
        let cny = (usage.prompt_tokens as f64 / 1000.0) * input
            + (usage.completion_tokens as f64 / 1000.0) * output;
        cny / CNY_PER_USD
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
            "zhipu response: model={}, {}",
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
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
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
