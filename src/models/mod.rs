//! Model provider abstractions.
//!
//! Defines the [`ModelProvider`] trait, the [`ChatMessage`] type,
//! error classification for remote failures and the concrete
//! implementations ([`AnthropicProvider`], [`OpenAIProvider`],
//! [`EchoProvider`]).

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, ProviderKind};

// ---------------------------------------------------------------------------
// ChatMessage – shared message representation
// ---------------------------------------------------------------------------

/// A single chat message with a role and content.
///
/// Roles are `"system"`, `"user"` and `"assistant"`.  Providers whose
/// API takes the system prompt out of band lift `system` messages out
/// of the list themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelProvider trait
// ---------------------------------------------------------------------------

/// Trait implemented by every LLM backend.
///
/// Each provider knows how to turn a list of chat messages into a
/// single assistant reply string.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send a sequence of chat messages and return the assistant's reply.
    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String, anyhow::Error>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

// ---------------------------------------------------------------------------
// EchoProvider – offline stub
// ---------------------------------------------------------------------------

/// Echoes the last user message back.  Needs no credentials; useful for
/// trying the terminal loop offline.
#[derive(Debug, Default)]
pub struct EchoProvider;

#[async_trait]
impl ModelProvider for EchoProvider {
    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String, anyhow::Error> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("[stub] echo: {last_user}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Check if an error represents a permanent HTTP failure that retrying
/// the same request cannot fix (auth errors, bad request, not found).
///
/// Parses status codes from error messages like
/// "Anthropic API returned 401 Unauthorized: …".
pub fn is_permanent_error(err: &anyhow::Error) -> bool {
    let msg = err.to_string();
    ["400", "401", "403", "404", "422"]
        .iter()
        .any(|code| msg.contains(&format!("returned {code}")))
}

// ---------------------------------------------------------------------------
// Construction from config
// ---------------------------------------------------------------------------

/// Build the provider selected in `cfg`.
///
/// Fails when a remote provider has no API key so that a missing key
/// stops the program at startup rather than at the first turn.
pub fn build_provider(cfg: &Config) -> anyhow::Result<Box<dyn ModelProvider>> {
    let params = GenerationParams::from_config(cfg);
    let provider: Box<dyn ModelProvider> = match cfg.provider {
        ProviderKind::Anthropic => {
            let key = require_key(cfg)?;
            let endpoint = cfg
                .endpoint
                .clone()
                .unwrap_or_else(|| anthropic::DEFAULT_ENDPOINT.to_string());
            Box::new(AnthropicProvider::with_config(key, endpoint, params))
        }
        ProviderKind::OpenAI => {
            let key = require_key(cfg)?;
            let endpoint = cfg
                .endpoint
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_ENDPOINT.to_string());
            Box::new(OpenAIProvider::with_config(key, endpoint, params))
        }
        ProviderKind::Echo => {
            warn!("echo provider selected, replies are local stubs");
            Box::new(EchoProvider)
        }
    };
    info!(provider = provider.name(), model = %cfg.model, "model provider ready");
    Ok(provider)
}

fn require_key(cfg: &Config) -> anyhow::Result<String> {
    cfg.resolve_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "no API key for provider '{}': set api_key in the config file or export {}",
            cfg.provider.as_str(),
            cfg.provider.key_env_vars().join(" / ")
        )
    })
}
