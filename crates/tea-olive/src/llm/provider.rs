//! LLM provider trait and provider identities.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::LLMError;
use super::types::{CallRequest, CallResult, CompletionRequest};
use crate::frame::FrameStream;

/// Trait implemented by every provider adapter.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Make one synchronous call and normalize the result.
    ///
    /// Non-2xx upstream responses are returned as `Ok` with their status.
    async fn invoke(&self, request: CallRequest) -> Result<CallResult, LLMError>;

    /// Start a streamed completion.
    ///
    /// Errors here happen before the first frame. Failures after that are
    /// reported in-band as an `error` frame followed by `finish`.
    async fn stream(&self, request: CompletionRequest) -> Result<FrameStream, LLMError>;
}

// ============================================================================
// ProviderId
// ============================================================================

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAI,
    Claude,
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::OpenAI, ProviderId::Claude, ProviderId::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Claude => "claude",
            ProviderId::Gemini => "gemini",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OpenAI",
            ProviderId::Claude => "Claude",
            ProviderId::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the API key.
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OPENAI_API_KEY",
            ProviderId::Claude => "ANTHROPIC_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Environment variable overriding the base URL.
    pub fn base_url_env(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OPENAI_BASE_URL",
            ProviderId::Claude => "ANTHROPIC_BASE_URL",
            ProviderId::Gemini => "GEMINI_API_BASE",
        }
    }

    /// Environment variable overriding the default model.
    pub fn model_env(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OPENAI_MODEL",
            ProviderId::Claude => "ANTHROPIC_MODEL",
            ProviderId::Gemini => "GEMINI_MODEL",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "https://api.openai.com",
            ProviderId::Claude => "https://api.anthropic.com",
            ProviderId::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "gpt-4o-mini",
            ProviderId::Claude => "claude-3-5-sonnet-20240620",
            ProviderId::Gemini => "gemini-2.5-flash-lite",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderId::OpenAI),
            "claude" => Ok(ProviderId::Claude),
            "gemini" => Ok(ProviderId::Gemini),
            other => Err(LLMError::UnsupportedProvider(other.to_string())),
        }
    }
}

// ============================================================================
// ProviderProfile
// ============================================================================

/// Display and lookup metadata for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: ProviderId,
    pub label: &'static str,
    pub default_model: String,
    pub env_key: &'static str,
}

// ============================================================================
// Helpers
// ============================================================================

/// Best-effort JSON body: `None` when the body cannot be read or parsed.
pub(crate) async fn read_json_body(response: reqwest::Response) -> Option<Value> {
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "failed to read upstream body");
            return None;
        }
    };
    serde_json::from_slice(&bytes).ok()
}
