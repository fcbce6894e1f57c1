//! Common types for provider calls and chat completions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Synchronous call contract
// ============================================================================

/// A single-prompt call routed to one provider.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
}

/// Normalized outcome of one upstream call.
///
/// Non-2xx responses are still results: `status` carries the upstream code and
/// `raw_response` whatever JSON the provider sent back.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// Parsed upstream body, `None` when it was not JSON.
    pub raw_response: Option<Value>,
    /// Extracted human-readable text, `None` when the shape did not match.
    pub text_output: Option<String>,
    /// The exact body sent upstream.
    pub request_payload: Value,
    pub status: u16,
}

// ============================================================================
// Completion requests (UI-generation client format)
// ============================================================================

/// A chat completion request as sent by the UI-generation client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<CompletionMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(
        default,
        rename = "toolChoice",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_choice: Option<Value>,
    #[serde(
        default,
        rename = "responseFormat",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_format: Option<Value>,
}

impl CompletionRequest {
    /// Requested model, ignoring empty strings.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(default)
    }
}

/// A role-tagged message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum CompletionMessage {
    User {
        content: Value,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default, rename = "toolCalls", skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        #[serde(default)]
        content: Value,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(default, rename = "toolName")]
        tool_name: String,
    },
    Error {
        content: String,
    },
}

/// A completed tool call recorded on an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default)]
    pub index: u32,
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

fn function_type() -> String {
    "function".to_string()
}

// ============================================================================
// Completion chunks (frame payload)
// ============================================================================

/// One incremental completion chunk, shaped like an OpenAI stream chunk with
/// camelCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub choices: Vec<ChunkChoice>,
}

impl CompletionChunk {
    /// A single-choice chunk carrying assistant text.
    pub fn text(content: String, finish_reason: Option<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: Some(content),
                    role: Some("assistant".to_string()),
                    tool_calls: None,
                },
                finish_reason,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A partial tool call inside a chunk delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Join the `text` strings of `parts` with `separator`, skipping empty values.
///
/// With `bare_strings`, parts that are themselves strings count as text.
pub(crate) fn join_text_parts(parts: &[Value], separator: &str, bare_strings: bool) -> String {
    parts
        .iter()
        .filter_map(|part| match part.get("text") {
            Some(Value::String(text)) => Some(text.as_str()),
            _ if bare_strings => part.as_str(),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Render message content as text: strings verbatim, anything else as JSON.
pub(crate) fn content_as_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
