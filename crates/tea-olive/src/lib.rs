//! Tea Olive - check OpenAI, Claude and Gemini API keys through one HTTP surface.

pub mod build_info;
pub mod check;
pub mod config;
pub mod frame;
pub mod handlers;
pub mod llm;
pub mod response;
pub mod server;
pub mod sse_parser;
