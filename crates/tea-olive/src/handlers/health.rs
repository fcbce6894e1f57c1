use axum::extract::State;
use axum::http::StatusCode;

use crate::server::AppState;

/// GET /livez
pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// GET /readyz
///
/// Ready once at least one provider has a key.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.providers.entries().any(|entry| entry.configured) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no provider keys configured")
    }
}
