//! OpenAI chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{ChatMessage, GenerationParams, ModelProvider};

/// Default endpoint for OpenAI chat completions.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Provider that talks to the OpenAI-compatible chat completions API.
pub struct OpenAIProvider {
    api_key: String,
    endpoint: String,
    client: Client,
    params: GenerationParams,
}

impl OpenAIProvider {
    /// Create a provider with explicit configuration (useful for tests
    /// or non-default endpoints).
    pub fn with_config(api_key: String, endpoint: String, params: GenerationParams) -> Self {
        Self {
            api_key,
            endpoint,
            client: Client::builder()
                .timeout(Duration::from_secs(90))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            params,
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        json!({
            "model": self.params.model,
            "messages": messages,
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    /// Send chat messages to the completions endpoint and return the
    /// first choice's content.
    ///
    /// Messages are forwarded with their original roles.
    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String, anyhow::Error> {
        let body = self.request_body(messages);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API returned {status}: {text}");
        }

        let json: serde_json::Value = resp.json().await?;

        // Extract the assistant reply from the first choice.
        match json["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(content.to_string()),
            None => anyhow::bail!("OpenAI API returned no message content"),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}
