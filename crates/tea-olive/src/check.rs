//! Key check: validate a request, call one provider, build the envelope.

use std::time::Instant;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{CallRequest, LLMError, ProviderId, ProviderRegistry};

/// Errors surfaced by a key check.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Malformed client input.
    #[error("{0}")]
    Validation(String),

    /// Provider call failed before a response (missing key, transport).
    #[error(transparent)]
    Provider(#[from] LLMError),
}

impl CheckError {
    pub fn status(&self) -> StatusCode {
        match self {
            CheckError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A validated check request.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub provider: ProviderId,
    pub prompt: String,
    pub model: Option<String>,
    pub system: Option<String>,
}

impl CheckRequest {
    /// Validate a JSON body: `{provider, prompt, model?, system?}`.
    ///
    /// `model` and `system` are only taken when truthy; non-string values are
    /// rendered as strings.
    pub fn from_json(body: &[u8]) -> Result<Self, CheckError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| CheckError::Validation(format!("invalid JSON body: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(CheckError::Validation(
                "request body must be a JSON object".to_string(),
            ));
        };

        let provider = match fields.get("provider") {
            Some(Value::String(p)) => p.parse::<ProviderId>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            CheckError::Validation(
                "provider: expected one of 'openai' | 'claude' | 'gemini'".to_string(),
            )
        })?;

        let prompt = match fields.get("prompt") {
            Some(Value::String(p)) => p.clone(),
            _ => return Err(CheckError::Validation("prompt: expected string".to_string())),
        };

        Self::new(
            provider,
            prompt,
            fields.get("model").and_then(truthy_string),
            fields.get("system").and_then(truthy_string),
        )
    }

    pub fn new(
        provider: ProviderId,
        prompt: String,
        model: Option<String>,
        system: Option<String>,
    ) -> Result<Self, CheckError> {
        if prompt.is_empty() {
            return Err(CheckError::Validation(
                "prompt: Prompt is required".to_string(),
            ));
        }
        Ok(Self {
            provider,
            prompt,
            model,
            system,
        })
    }
}

fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Uniform success envelope returned for every provider.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSuccess {
    pub success: bool,
    pub provider: ProviderId,
    pub provider_label: &'static str,
    pub duration_ms: u64,
    pub model_used: String,
    pub prompt: String,
    pub request_payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<Value>,
    pub text_output: Option<String>,
    pub status: u16,
}

/// Failure envelope.
#[derive(Debug, Serialize)]
pub struct CheckFailure {
    pub success: bool,
    pub error: String,
}

impl CheckFailure {
    pub fn new(error: &CheckError) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

/// Run one key check against the registry.
pub async fn run_check(
    registry: &ProviderRegistry,
    request: CheckRequest,
) -> Result<CheckSuccess, CheckError> {
    let entry = registry.lookup(request.provider)?;
    let model_used = request
        .model
        .clone()
        .unwrap_or_else(|| entry.profile.default_model.clone());

    let started = Instant::now();
    let result = entry
        .provider
        .invoke(CallRequest {
            prompt: request.prompt.clone(),
            system: request.system,
            model: request.model,
        })
        .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                provider = %request.provider,
                duration_ms,
                error = %e,
                "key check failed"
            );
            return Err(e.into());
        }
    };

    tracing::info!(
        provider = %request.provider,
        model = %model_used,
        status = result.status,
        duration_ms,
        "key check complete"
    );

    Ok(CheckSuccess {
        success: true,
        provider: request.provider,
        provider_label: entry.profile.label,
        duration_ms,
        model_used,
        prompt: request.prompt,
        request_payload: result.request_payload,
        response_payload: result.raw_response,
        text_output: result.text_output,
        status: result.status,
    })
}
