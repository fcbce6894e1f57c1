//! Streaming completion handler.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::StreamExt;

use crate::frame;
use crate::llm::{CompletionRequest, ProviderId};
use crate::response;
use crate::server::AppState;

/// POST /stream-equivalent/{provider}
///
/// Request body: a chat completion request (`messages`, optional `model`,
/// `system`, `tools`, `responseFormat`).
///
/// Responds with length-prefixed frames (`chunk`* then `finish`, with an
/// `error` before `finish` on failure). Failures before the first frame are
/// plain-text: 400 for an unknown provider, 500 otherwise.
pub async fn stream_equivalent(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Response {
    let Ok(id) = provider.parse::<ProviderId>() else {
        return response::bad_request("Unsupported provider");
    };
    let Ok(entry) = state.providers.lookup(id) else {
        return response::bad_request("Unsupported provider");
    };

    let request: CompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return response::internal_error(format!("invalid completion request: {e}")),
    };

    let message_count = request.messages.len();
    let frames = match entry.provider.stream(request).await {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!(provider = %id, error = %e, "stream request failed");
            return response::internal_error(e.to_string());
        }
    };
    tracing::info!(provider = %id, messages = message_count, "streaming completion");

    let frames = frame::with_idle_timeout(frames, state.stream_idle_timeout);
    let body = Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(frame.encode())));
    response::octet_stream(body)
}
