//! LLM error types.

use thiserror::Error;

/// Errors that can occur when making LLM API calls.
///
/// Non-2xx upstream responses are not errors: they are carried as data in
/// [`CallResult::status`](super::CallResult) or as an in-band error frame.
#[derive(Debug, Error)]
pub enum LLMError {
    /// The provider's API key environment variable is unset.
    #[error("{env_key} is not set")]
    MissingCredential { env_key: &'static str },

    /// Provider identifier is not one of the known providers.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// HTTP request failed before a response was received.
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream URL could not be built from the configured base URL.
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
}
