//! Provider adapters for OpenAI, Claude and Gemini.

mod anthropic;
mod error;
mod gemini;
mod openai;
mod provider;
mod registry;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::LLMError;
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use provider::{LLMProvider, ProviderId, ProviderProfile};
pub use registry::{ProviderEntry, ProviderRegistry};
pub use types::{
    CallRequest, CallResult, ChunkChoice, ChunkDelta, CompletionChunk, CompletionMessage,
    CompletionRequest, FunctionCall, FunctionCallDelta, ToolCall, ToolCallDelta, ToolDefinition,
};
