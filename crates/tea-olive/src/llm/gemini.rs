//! Google Gemini `generateContent` adapter.
//!
//! The API key travels as a `key` query parameter, so request URLs are never
//! logged.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use url::Url;

use super::error::LLMError;
use super::provider::{LLMProvider, ProviderId, read_json_body};
use super::types::{
    CallRequest, CallResult, ChunkChoice, ChunkDelta, CompletionChunk, CompletionMessage,
    CompletionRequest, FunctionCallDelta, ToolCallDelta, content_as_text, join_text_parts,
};
use crate::config::ProviderSettings;
use crate::frame::{self, FrameStream, SseDecoded, SseFrameStream};
use crate::sse_parser::SseEvent;

/// Gemini provider using the `v1beta` REST API.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl GeminiProvider {
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
                env_key: ProviderId::Gemini.env_key(),
            })
    }

    /// `{base}/v1beta/models/{model}:{method}?[alt=sse&]key={api_key}`
    fn endpoint(
        &self,
        model: &str,
        method: &str,
        api_key: &str,
        sse: bool,
    ) -> Result<Url, LLMError> {
        let mut url = Url::parse(&format!(
            "{}/v1beta/models/{}:{}",
            self.base_url, model, method
        ))?;
        {
            let mut query = url.query_pairs_mut();
            if sse {
                query.append_pair("alt", "sse");
            }
            query.append_pair("key", api_key);
        }
        Ok(url)
    }

    fn build_request(&self, url: Url, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn invoke(&self, request: CallRequest) -> Result<CallResult, LLMError> {
        let api_key = self.api_key()?;
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let url = self.endpoint(model, "generateContent", api_key, false)?;
        let body = to_request(&request);

        let response = self.build_request(url, &body).send().await?;
        let status = response.status().as_u16();
        let raw_response = read_json_body(response).await;
        let text_output = raw_response.as_ref().and_then(extract_text);

        tracing::debug!(status, model, has_text = text_output.is_some(), "gemini call complete");

        Ok(CallResult {
            raw_response,
            text_output,
            request_payload: body,
            status,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<FrameStream, LLMError> {
        let api_key = self.api_key()?;
        let model = request.model_or(&self.default_model);
        let url = self.endpoint(model, "streamGenerateContent", api_key, true)?;
        let body = to_stream_request(&request);

        let response = self.build_request(url, &body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, "gemini stream request rejected");
            return Ok(frame::error_then_finish(format!(
                "Gemini request failed ({status}): {message}"
            )));
        }

        let mut decoder = StreamDecoder::default();
        Ok(Box::pin(SseFrameStream::new(
            response.bytes_stream(),
            move |event: &SseEvent| decoder.decode(event),
        )))
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_request(request: &CallRequest) -> Value {
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
    });
    if let Some(ref system) = request.system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    body
}

/// Joined `candidates[0].content.parts[].text`, `None` when parts are missing.
fn extract_text(raw: &Value) -> Option<String> {
    raw.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| join_text_parts(parts, "\n", false))
}

fn to_stream_request(request: &CompletionRequest) -> Value {
    let contents: Vec<Value> = request.messages.iter().filter_map(to_content).collect();
    let mut body = json!({"contents": contents});

    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{"functionDeclarations": declarations}]);
    }
    if let Some(ref schema) = request.response_format {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseJsonSchema": schema,
        });
    }
    body
}

/// Translate one message into a Gemini `content`. Assistant messages with no
/// text and no tool calls are dropped since Gemini rejects empty parts.
fn to_content(message: &CompletionMessage) -> Option<Value> {
    match message {
        CompletionMessage::User { content } => Some(json!({
            "role": "user",
            "parts": [{"text": content_as_text(content)}],
        })),
        CompletionMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut parts = Vec::new();
            if let Some(text) = content.as_ref().map(content_as_text).filter(|t| !t.is_empty()) {
                parts.push(json!({"text": text}));
            }
            for tc in tool_calls {
                let args: Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| Value::Object(Map::new()));
                parts.push(json!({"functionCall": {"name": tc.function.name, "args": args}}));
            }
            if parts.is_empty() {
                return None;
            }
            Some(json!({"role": "model", "parts": parts}))
        }
        CompletionMessage::Tool {
            content, tool_name, ..
        } => {
            let response = match content {
                Value::Object(_) => content.clone(),
                other => json!({"result": other}),
            };
            Some(json!({
                "role": "user",
                "parts": [{"functionResponse": {"name": tool_name, "response": response}}],
            }))
        }
        CompletionMessage::Error { content } => Some(json!({
            "role": "model",
            "parts": [{"text": format!("Runtime error: {content}")}],
        })),
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// Per-stream decoder state.
///
/// Tool call indexes keep counting across events so each call gets its own
/// slot when clients merge deltas by index.
#[derive(Default)]
struct StreamDecoder {
    next_tool_index: u32,
}

impl StreamDecoder {
    fn decode(&mut self, event: &SseEvent) -> SseDecoded {
        let decoded = decode_event(event, self.next_tool_index);
        if let SseDecoded::Chunk(ref chunk) = decoded {
            let calls = chunk.choices[0].delta.tool_calls.as_ref().map_or(0, Vec::len);
            self.next_tool_index += calls as u32;
        }
        decoded
    }
}

fn decode_event(event: &SseEvent, first_tool_index: u32) -> SseDecoded {
    let value: Value = match serde_json::from_str(&event.data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(data = %event.data, error = %e, "failed to parse Gemini SSE event");
            return SseDecoded::Skip;
        }
    };

    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return SseDecoded::Error(message.to_string());
    }
    let Some(candidate) = value.pointer("/candidates/0") else {
        return SseDecoded::Skip;
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let text = join_text_parts(parts, "", false);
    let tool_calls: Vec<ToolCallDelta> = parts
        .iter()
        .filter_map(|part| part.get("functionCall"))
        .enumerate()
        .map(|(offset, call)| ToolCallDelta {
            index: first_tool_index + offset as u32,
            id: Some(format!("call_{}", ulid::Ulid::new())),
            tool_type: Some("function".to_string()),
            function: Some(FunctionCallDelta {
                name: call.get("name").and_then(Value::as_str).map(str::to_string),
                arguments: Some(
                    call.get("args")
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Map::new()))
                        .to_string(),
                ),
            }),
        })
        .collect();

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .map(|reason| map_finish_reason(reason, !tool_calls.is_empty()));

    SseDecoded::Chunk(CompletionChunk {
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                content: (!text.is_empty()).then_some(text),
                role: Some("assistant".to_string()),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason,
        }],
    })
}

fn map_finish_reason(reason: &str, has_tool_calls: bool) -> String {
    match reason {
        "STOP" if has_tool_calls => "tool_calls".to_string(),
        "STOP" => "stop".to_string(),
        "MAX_TOKENS" => "length".to_string(),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
            "content_filter".to_string()
        }
        other => other.to_lowercase(),
    }
}
