//! Synchronous key check handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;

use crate::check::{CheckFailure, CheckRequest, run_check};
use crate::response;
use crate::server::AppState;

/// POST /check-equivalent
///
/// Request body: `{"provider": "openai"|"claude"|"gemini", "prompt": "...", "model"?, "system"?}`
///
/// The response status mirrors the upstream status. Validation failures are
/// 400 and provider failures (missing key, transport) are 500, both with a
/// `{"success": false, "error": "..."}` body.
pub async fn check_equivalent(State(state): State<AppState>, body: Bytes) -> Response {
    let outcome = match CheckRequest::from_json(&body) {
        Ok(request) => run_check(&state.providers, request).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(envelope) => {
            let status =
                StatusCode::from_u16(envelope.status).unwrap_or(StatusCode::BAD_GATEWAY);
            response::json(status, envelope)
        }
        Err(e) => response::json(e.status(), CheckFailure::new(&e)),
    }
}
