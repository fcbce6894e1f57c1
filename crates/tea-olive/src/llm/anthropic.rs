//! Anthropic messages adapter.
//!
//! Streaming is simulated: one non-streaming `/v1/messages` call is replayed as
//! a single chunk frame. See [`AnthropicProvider::one_shot_stream`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::error::LLMError;
use super::provider::{LLMProvider, ProviderId, read_json_body};
use super::types::{
    CallRequest, CallResult, CompletionChunk, CompletionMessage, CompletionRequest,
    content_as_text, join_text_parts,
};
use crate::config::Settings;
use crate::frame::{self, FrameStream, StreamFrame};

/// Anthropic provider with native API format.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_version: String,
    default_model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub const DEFAULT_SYSTEM: &'static str = "You help verify the Anthropic Claude API key.";

    #[must_use]
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            base_url: settings.claude.base_url.clone(),
            api_key: settings.claude.api_key.clone(),
            api_version: settings.anthropic_version.clone(),
            default_model: settings.claude.default_model.clone(),
            max_tokens: settings.anthropic_max_tokens,
        }
    }

    fn api_key(&self) -> Result<&str, LLMError> {
        self.api_key
            .as_deref()
            .ok_or(LLMError::MissingCredential {
                env_key: ProviderId::Claude.env_key(),
            })
    }

    /// Build a POST to `/v1/messages` with auth and version headers.
    fn build_request(&self, api_key: &str, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(body)
    }

    /// Simulate a stream with a single non-streaming call.
    ///
    /// Non-2xx responses become `[error, finish]`; success becomes one chunk
    /// holding the whole reply, then `finish`.
    async fn one_shot_stream(&self, request: CompletionRequest) -> Result<FrameStream, LLMError> {
        let api_key = self.api_key()?;
        let body = to_one_shot_request(&request, &self.default_model, self.max_tokens);

        let response = self.build_request(api_key, &body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, "claude request rejected");
            return Ok(frame::error_then_finish(format!(
                "Claude request failed ({status}): {message}"
            )));
        }

        let payload = read_json_body(response).await;
        let chunk = to_chunk(payload.as_ref());
        Ok(frame::from_frames(vec![
            StreamFrame::Chunk { chunk },
            StreamFrame::Finish,
        ]))
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn invoke(&self, request: CallRequest) -> Result<CallResult, LLMError> {
        let api_key = self.api_key()?;
        let body = to_request(&request, &self.default_model, self.max_tokens);

        let response = self.build_request(api_key, &body).send().await?;
        let status = response.status().as_u16();
        let raw_response = read_json_body(response).await;
        let text_output = raw_response.as_ref().and_then(extract_text);

        tracing::debug!(status, has_text = text_output.is_some(), "claude call complete");

        Ok(CallResult {
            raw_response,
            text_output,
            request_payload: body,
            status,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<FrameStream, LLMError> {
        self.one_shot_stream(request).await
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_request(request: &CallRequest, default_model: &str, max_tokens: u32) -> Value {
    json!({
        "model": request.model.as_deref().unwrap_or(default_model),
        "system": request.system.as_deref().unwrap_or(AnthropicProvider::DEFAULT_SYSTEM),
        "max_tokens": max_tokens,
        "messages": [{"role": "user", "content": request.prompt}],
    })
}

/// Joined `content[].text` fragments, `None` when `content` is not an array.
fn extract_text(raw: &Value) -> Option<String> {
    raw.get("content")
        .and_then(Value::as_array)
        .map(|parts| join_text_parts(parts, "\n", true))
}

fn to_one_shot_request(request: &CompletionRequest, default_model: &str, max_tokens: u32) -> Value {
    let mut body = json!({
        "model": request.model_or(default_model),
        "max_tokens": max_tokens,
        "messages": request.messages.iter().map(to_message).collect::<Vec<_>>(),
    });
    if let Some(ref system) = request.system {
        body["system"] = json!(system);
    }
    body
}

fn to_message(message: &CompletionMessage) -> Value {
    match message {
        CompletionMessage::Tool {
            content,
            tool_call_id,
            ..
        } => json!({
            "role": "assistant",
            "content": json!({"toolCallId": tool_call_id, "payload": content}).to_string(),
        }),
        // Upstream rejects empty text content.
        CompletionMessage::Assistant { content, .. } => match content {
            Some(content) => json!({"role": "assistant", "content": content_as_text(content)}),
            None => json!({"role": "assistant"}),
        },
        CompletionMessage::Error { content } => json!({
            "role": "assistant",
            "content": format!("Runtime error: {content}"),
        }),
        CompletionMessage::User { content } => json!({"role": "user", "content": content}),
    }
}

fn to_chunk(payload: Option<&Value>) -> CompletionChunk {
    let content = payload.and_then(extract_text).unwrap_or_default();
    let finish_reason = payload
        .and_then(|p| p.get("stop_reason"))
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();
    CompletionChunk::text(content, Some(finish_reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{FunctionCall, ToolCall};

    #[test]
    fn request_uses_defaults() {
        let body = to_request(
            &CallRequest {
                prompt: "ping".to_string(),
                ..Default::default()
            },
            "claude-test",
            1024,
        );
        assert_eq!(
            body,
            json!({
                "model": "claude-test",
                "system": AnthropicProvider::DEFAULT_SYSTEM,
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "ping"}],
            })
        );
    }

    #[test]
    fn extract_text_joins_fragments() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "t", "name": "x", "input": {}},
                {"type": "text", "text": "second"}
            ]
        });
        assert_eq!(extract_text(&raw).as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn extract_text_absent_without_content_array() {
        assert!(extract_text(&json!({"type": "error", "error": {"message": "bad"}})).is_none());
        assert_eq!(extract_text(&json!({"content": []})).as_deref(), Some(""));
    }

    #[test]
    fn one_shot_request_translates_roles() {
        let request = CompletionRequest {
            system: Some("summarize".to_string()),
            messages: vec![
                CompletionMessage::User {
                    content: json!("hello"),
                },
                CompletionMessage::Assistant {
                    content: Some(json!({"ui": []})),
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        index: 0,
                        tool_type: "function".to_string(),
                        function: FunctionCall {
                            name: "show".to_string(),
                            arguments: "{}".to_string(),
                        },
                    }],
                },
                CompletionMessage::Tool {
                    content: json!({"status": "fulfilled", "value": 42}),
                    tool_call_id: "call_1".to_string(),
                    tool_name: "show".to_string(),
                },
                CompletionMessage::Error {
                    content: "boom".to_string(),
                },
            ],
            ..Default::default()
        };

        let body = to_one_shot_request(&request, "claude-test", 512);
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["system"], "summarize");
        assert_eq!(body["max_tokens"], 512);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0], json!({"role": "user", "content": "hello"}));
        assert_eq!(messages[1], json!({"role": "assistant", "content": r#"{"ui":[]}"#}));

        assert_eq!(messages[2]["role"], "assistant");
        let envelope: Value =
            serde_json::from_str(messages[2]["content"].as_str().unwrap()).unwrap();
        assert_eq!(
            envelope,
            json!({"toolCallId": "call_1", "payload": {"status": "fulfilled", "value": 42}})
        );

        assert_eq!(
            messages[3],
            json!({"role": "assistant", "content": "Runtime error: boom"})
        );
    }

    #[test]
    fn one_shot_request_omits_missing_system() {
        let body = to_one_shot_request(&CompletionRequest::default(), "claude-test", 1024);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn assistant_string_content_is_kept_verbatim() {
        let message = to_message(&CompletionMessage::Assistant {
            content: Some(json!("plain")),
            tool_calls: vec![],
        });
        assert_eq!(message["content"], "plain");
    }

    #[test]
    fn assistant_without_content_omits_the_key() {
        let message = to_message(&CompletionMessage::Assistant {
            content: None,
            tool_calls: vec![],
        });
        assert_eq!(message, json!({"role": "assistant"}));
    }

    #[test]
    fn chunk_joins_text_and_copies_stop_reason() {
        let payload = json!({
            "content": [{"text": "a"}, {"text": "b"}],
            "stop_reason": "end_turn"
        });
        let chunk = to_chunk(Some(&payload));
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("a\nb"));
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn chunk_defaults_to_stop_and_empty_text() {
        let chunk = to_chunk(Some(&json!({"content": [{"text": "a"}], "stop_reason": null})));
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));

        let chunk = to_chunk(None);
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some(""));
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
