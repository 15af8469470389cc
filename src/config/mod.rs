use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Which remote service answers the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API.
    #[default]
    Anthropic,
    /// OpenAI-compatible chat completions.
    #[serde(rename = "openai")]
    OpenAI,
    /// Local echo stub, no network.
    Echo,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAI => "openai",
            ProviderKind::Echo => "echo",
        }
    }

    /// Environment variables consulted, in order, when the config does
    /// not carry an API key.
    pub fn key_env_vars(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY", "API_KEY"],
            ProviderKind::OpenAI => &["OPENAI_API_KEY", "API_KEY"],
            ProviderKind::Echo => &[],
        }
    }

    fn max_temperature(self) -> f32 {
        match self {
            ProviderKind::OpenAI => 2.0,
            ProviderKind::Anthropic | ProviderKind::Echo => 1.0,
        }
    }
}

/// Log verbosity when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Transcript file settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Transcript path.  Relative paths resolve against the eli home
    /// directory when loaded from a file.
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
    /// Create the transcript on first run.  When `false` a missing file
    /// is a startup error.
    #[serde(default = "default_true")]
    pub auto_create: bool,
    /// Content written into a newly created transcript.
    #[serde(default = "default_session_content")]
    pub default_content: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
            auto_create: true,
            default_content: default_session_content(),
        }
    }
}

/// Prior-history budget for requests.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Token budget for earlier sessions placed in the system prompt.
    /// `null` sends the whole transcript.
    #[serde(default = "default_context_tokens")]
    pub max_tokens: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_context_tokens(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_session_file() -> PathBuf {
    PathBuf::from("session.txt")
}

fn default_session_content() -> String {
    "# Therapy Session History\n\n".to_string()
}

fn default_context_tokens() -> Option<usize> {
    Some(50_000)
}

fn default_model() -> String {
    "claude-3-5-sonnet-20240620".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.9
}

/// Top-level configuration loaded from `config.yaml`.
///
/// Built once at startup and passed by reference; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Remote service kind.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Ceiling on generated tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// API key: literal value or env-var reference like `$ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the provider endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Log verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_key: None,
            endpoint: None,
            log_level: LogLevel::default(),
            session: SessionConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl Config {
    /// Read, parse and validate a YAML configuration file.
    ///
    /// Relative session paths are resolved against [`crate::eli_home`].
    pub async fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let mut config = Config::from_yaml(&contents)?;
        config.resolve_paths(&crate::eli_home());

        tracing::debug!(
            path = %path.display(),
            provider = config.provider.as_str(),
            session_file = %config.session.file.display(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Like [`load`](Config::load), but a missing file yields the
    /// built-in defaults.  Used for the implicit default config path.
    pub async fn load_or_default(path: &Path) -> anyhow::Result<Config> {
        match tokio::fs::metadata(path).await {
            Ok(_) => Config::load(path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Config::default();
                config.resolve_paths(&crate::eli_home());
                Ok(config)
            }
            Err(e) => {
                Err(e).with_context(|| format!("failed to stat config file: {}", path.display()))
            }
        }
    }

    /// Parse and validate YAML text without touching paths.
    pub fn from_yaml(contents: &str) -> anyhow::Result<Config> {
        // An empty (or all-comment) file means "all defaults".
        let contents = if contents.lines().all(|l| {
            let l = l.trim();
            l.is_empty() || l.starts_with('#')
        }) {
            "{}"
        } else {
            contents
        };
        let config: Config =
            serde_yaml_ng::from_str(contents).context("failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            anyhow::bail!("config: model must not be empty");
        }
        if self.max_tokens == 0 {
            anyhow::bail!("config: max_tokens must be greater than 0");
        }
        let max_temp = self.provider.max_temperature();
        if !(0.0..=max_temp).contains(&self.temperature) {
            anyhow::bail!(
                "config: temperature {} is outside 0.0..={} for provider '{}'",
                self.temperature,
                max_temp,
                self.provider.as_str()
            );
        }
        if self.session.file.as_os_str().is_empty() {
            anyhow::bail!("config: session.file must not be empty");
        }
        if self.context.max_tokens == Some(0) {
            anyhow::bail!("config: context.max_tokens must be greater than 0 (or null)");
        }
        Ok(())
    }

    /// Make a relative session path absolute under `home`.
    pub fn resolve_paths(&mut self, home: &Path) {
        if self.session.file.is_relative() {
            self.session.file = home.join(&self.session.file);
        }
    }

    /// Resolve the API key: the configured value (expanding a `$VAR`
    /// reference), then the provider's environment variables.  Empty
    /// values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        let from_config = self.api_key.as_deref().and_then(|raw| {
            match raw.strip_prefix('$') {
                Some(var) => std::env::var(var).ok(),
                None => Some(raw.to_string()),
            }
        });

        from_config
            .into_iter()
            .chain(
                self.provider
                    .key_env_vars()
                    .iter()
                    .filter_map(|var| std::env::var(var).ok()),
            )
            .find(|k| !k.trim().is_empty())
    }
}
