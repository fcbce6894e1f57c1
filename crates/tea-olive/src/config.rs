use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::ProviderId;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Longest gap allowed between two upstream stream items.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_idle_timeout() -> u64 {
    60
}

// ============================================================================
// Settings (provider environment snapshot)
// ============================================================================

/// Provider credentials, endpoints and defaults, captured once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai: ProviderSettings,
    pub claude: ProviderSettings,
    pub gemini: ProviderSettings,
    pub anthropic_max_tokens: u32,
    pub anthropic_version: String,
}

#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub default_model: String,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

impl Settings {
    /// Snapshot the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let provider = |id: ProviderId| {
            let base_url =
                get(id.base_url_env()).unwrap_or_else(|| id.default_base_url().to_string());
            ProviderSettings {
                api_key: get(id.env_key()),
                base_url: base_url
                    .strip_suffix('/')
                    .map(str::to_string)
                    .unwrap_or(base_url),
                default_model: get(id.model_env())
                    .unwrap_or_else(|| id.default_model().to_string()),
            }
        };

        let anthropic_max_tokens = match get("ANTHROPIC_MAX_TOKENS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "ANTHROPIC_MAX_TOKENS",
                    value,
                })?,
            None => DEFAULT_ANTHROPIC_MAX_TOKENS,
        };

        Ok(Self {
            openai: provider(ProviderId::OpenAI),
            claude: provider(ProviderId::Claude),
            gemini: provider(ProviderId::Gemini),
            anthropic_max_tokens,
            anthropic_version: get("ANTHROPIC_VERSION")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_VERSION.to_string()),
        })
    }

    pub fn provider(&self, id: ProviderId) -> &ProviderSettings {
        match id {
            ProviderId::OpenAI => &self.openai,
            ProviderId::Claude => &self.claude,
            ProviderId::Gemini => &self.gemini,
        }
    }
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

// ============================================================================
// Tests
// ============================================================================
