//! Anthropic Messages API provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, GenerationParams, ModelProvider};

/// Default endpoint for the Messages API.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// API version header value.
pub const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Provider that talks to `POST /v1/messages`.
pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    client: Client,
    params: GenerationParams,
}

impl AnthropicProvider {
    /// Create a provider with explicit configuration (non-default
    /// endpoints are used by tests).
    pub fn with_config(api_key: String, endpoint: String, params: GenerationParams) -> Self {
        Self {
            api_key,
            endpoint,
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            params,
        }
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatRequest<'a> {
        // The Messages API takes the system prompt as a top-level field.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();

        ChatRequest {
            model: &self.params.model,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != "system")
                .map(|m| Message {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String, anyhow::Error> {
        let body = self.build_request(messages);

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API returned {status}: {text}");
        }

        let parsed: ChatResponse = resp.json().await?;
        extract_text(parsed)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Join all `text` blocks of a response.
fn extract_text(resp: ChatResponse) -> anyhow::Result<String> {
    let text: Vec<String> = resp
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect();
    if text.is_empty() {
        anyhow::bail!("Anthropic API returned no text content");
    }
    Ok(text.join(""))
}
