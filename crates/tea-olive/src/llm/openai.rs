//! OpenAI chat completions adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::error::LLMError;
use super::provider::{LLMProvider, ProviderId, read_json_body};
use super::types::{
    CallRequest, CallResult, ChunkChoice, ChunkDelta, CompletionChunk, CompletionMessage,
    CompletionRequest, ToolCallDelta, content_as_text,
};
use crate::config::ProviderSettings;
use crate::frame::{self, FrameStream, SseDecoded, SseFrameStream};
use crate::sse_parser::SseEvent;

/// OpenAI provider (and OpenAI-compatible endpoints via the base URL).
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl OpenAIProvider {
    pub const DEFAULT_SYSTEM: &'static str =
        "You help test whether an OpenAI API key works by echoing the user prompt clearly.";

    #[must_use]
    pub fn new(client: Client, settings: &ProviderSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            default_model: settings.default_model.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, LLMError> {
        self.api_key
            .as_deref()
            .ok_or(LLMError::MissingCredential {
                env_key: ProviderId::OpenAI.env_key(),
            })
    }

    fn build_request(&self, api_key: &str, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(body)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn invoke(&self, request: CallRequest) -> Result<CallResult, LLMError> {
        let api_key = self.api_key()?;
        let body = to_request(&request, &self.default_model);

        let response = self.build_request(api_key, &body).send().await?;
        let status = response.status().as_u16();
        let raw_response = read_json_body(response).await;
        let text_output = raw_response.as_ref().and_then(extract_text);

        tracing::debug!(status, has_text = text_output.is_some(), "openai call complete");

        Ok(CallResult {
            raw_response,
            text_output,
            request_payload: body,
            status,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<FrameStream, LLMError> {
        let api_key = self.api_key()?;
        let body = to_stream_request(&request, &self.default_model);

        let response = self.build_request(api_key, &body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, "openai stream request rejected");
            return Ok(frame::error_then_finish(format!(
                "OpenAI request failed ({status}): {message}"
            )));
        }

        Ok(Box::pin(SseFrameStream::new(
            response.bytes_stream(),
            decode_event,
        )))
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_request(request: &CallRequest, default_model: &str) -> Value {
    json!({
        "model": request.model.as_deref().unwrap_or(default_model),
        "messages": [
            {
                "role": "system",
                "content": request.system.as_deref().unwrap_or(OpenAIProvider::DEFAULT_SYSTEM),
            },
            {"role": "user", "content": request.prompt},
        ],
        "temperature": 0,
    })
}

/// `choices[0].message.content` when it is a non-empty string.
fn extract_text(raw: &Value) -> Option<String> {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn to_stream_request(request: &CompletionRequest, default_model: &str) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(request.messages.iter().map(to_message));

    let mut body = json!({
        "model": request.model_or(default_model),
        "messages": messages,
        "stream": true,
    });

    if !request.tools.is_empty() {
        body["tools"] = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect();
    }
    if let Some(ref choice) = request.tool_choice {
        body["tool_choice"] = choice.clone();
    }
    if let Some(ref schema) = request.response_format {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {"name": "schema", "strict": true, "schema": schema},
        });
    }
    body
}

fn to_message(message: &CompletionMessage) -> Value {
    match message {
        CompletionMessage::User { content } => json!({"role": "user", "content": content}),
        CompletionMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut out = json!({
                "role": "assistant",
                "content": content.as_ref().map(content_as_text),
            });
            if !tool_calls.is_empty() {
                out["tool_calls"] = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": tc.tool_type,
                            "function": {
                                "name": tc.function.name,
                                "arguments": tc.function.arguments,
                            },
                        })
                    })
                    .collect();
            }
            out
        }
        CompletionMessage::Tool {
            content,
            tool_call_id,
            ..
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content.to_string(),
        }),
        CompletionMessage::Error { content } => json!({
            "role": "assistant",
            "content": format!("Runtime error: {content}"),
        }),
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(serde::Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(serde::Deserialize)]
struct StreamChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Default, serde::Deserialize)]
struct StreamDelta {
    content: Option<String>,
    role: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(serde::Deserialize)]
struct StreamError {
    message: String,
}

fn decode_event(event: &SseEvent) -> SseDecoded {
    if event.data == "[DONE]" {
        return SseDecoded::Done;
    }

    let chunk = match serde_json::from_str::<StreamChunk>(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(data = %event.data, error = %e, "failed to parse OpenAI SSE event");
            return SseDecoded::Skip;
        }
    };

    if let Some(error) = chunk.error {
        return SseDecoded::Error(error.message);
    }
    // Usage-only chunks carry no choices.
    if chunk.choices.is_empty() {
        return SseDecoded::Skip;
    }

    SseDecoded::Chunk(CompletionChunk {
        choices: chunk
            .choices
            .into_iter()
            .map(|choice| ChunkChoice {
                index: choice.index,
                delta: ChunkDelta {
                    content: choice.delta.content,
                    role: choice.delta.role,
                    tool_calls: choice.delta.tool_calls,
                },
                finish_reason: choice.finish_reason,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{FunctionCall, ToolCall, ToolDefinition};

    #[test]
    fn request_uses_defaults() {
        let body = to_request(
            &CallRequest {
                prompt: "ping".to_string(),
                ..Default::default()
            },
            "gpt-4o-mini",
        );
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], OpenAIProvider::DEFAULT_SYSTEM);
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "ping"}));
    }

    #[test]
    fn request_honours_overrides() {
        let body = to_request(
            &CallRequest {
                prompt: "ping".to_string(),
                system: Some("be brief".to_string()),
                model: Some("gpt-4.1".to_string()),
            },
            "gpt-4o-mini",
        );
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["messages"][0]["content"], "be brief");
    }

    #[test]
    fn extract_text_from_first_choice() {
        let raw = json!({"choices": [{"message": {"role": "assistant", "content": "pong"}}]});
        assert_eq!(extract_text(&raw).as_deref(), Some("pong"));
    }

    #[test]
    fn extract_text_absent_on_shape_mismatch() {
        assert!(extract_text(&json!({"error": {"message": "bad key"}})).is_none());
        assert!(extract_text(&json!({"choices": []})).is_none());
        assert!(extract_text(&json!({"choices": [{"message": {"content": ""}}]})).is_none());
        assert!(extract_text(&json!({"choices": "nope"})).is_none());
    }

    #[test]
    fn stream_request_translates_messages() {
        let request = CompletionRequest {
            system: Some("summarize".to_string()),
            messages: vec![
                CompletionMessage::User {
                    content: json!("hi"),
                },
                CompletionMessage::Assistant {
                    content: None,
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
                    content: json!({"status": "fulfilled"}),
                    tool_call_id: "call_1".to_string(),
                    tool_name: "show".to_string(),
                },
                CompletionMessage::Error {
                    content: "boom".to_string(),
                },
            ],
            tools: vec![ToolDefinition {
                name: "show".to_string(),
                description: "Show a card".to_string(),
                parameters: json!({"type": "object"}),
            }],
            ..Default::default()
        };

        let body = to_stream_request(&request, "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "gpt-4o-mini");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], json!({"role": "system", "content": "summarize"}));
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "show");
        assert!(messages[2]["content"].is_null());
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(messages[3]["content"], r#"{"status":"fulfilled"}"#);
        assert_eq!(messages[4]["content"], "Runtime error: boom");
        assert_eq!(body["tools"][0]["function"]["name"], "show");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn stream_request_forwards_response_format() {
        let request = CompletionRequest {
            model: Some("gpt-4.1".to_string()),
            response_format: Some(json!({"type": "object"})),
            ..Default::default()
        };
        let body = to_stream_request(&request, "gpt-4o-mini");
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"],
            json!({"type": "object"})
        );
    }

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn decode_content_delta() {
        let decoded = decode_event(&event(
            r#"{"id":"x","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"},"finish_reason":null}]}"#,
        ));
        let SseDecoded::Chunk(chunk) = decoded else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn decode_tool_call_delta_as_camel_case() {
        let decoded = decode_event(&event(
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"show","arguments":"{\"a\""}}]},"finish_reason":"tool_calls"}]}"#,
        ));
        let SseDecoded::Chunk(chunk) = decoded else {
            panic!("expected chunk");
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["choices"][0]["finishReason"], "tool_calls");
        assert_eq!(
            value["choices"][0]["delta"]["toolCalls"][0]["function"]["name"],
            "show"
        );
    }

    #[test]
    fn decode_done_usage_and_errors() {
        assert!(matches!(decode_event(&event("[DONE]")), SseDecoded::Done));
        assert!(matches!(
            decode_event(&event(r#"{"choices":[],"usage":{"total_tokens":3}}"#)),
            SseDecoded::Skip
        ));
        assert!(matches!(decode_event(&event("not json")), SseDecoded::Skip));
        assert!(matches!(
            decode_event(&event(r#"{"error":{"message":"overloaded"}}"#)),
            SseDecoded::Error(ref m) if m == "overloaded"
        ));
    }
}
