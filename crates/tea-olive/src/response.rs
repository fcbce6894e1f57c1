//! Shared response builders for handlers.

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Plain-text response with the given status.
pub fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    plain_text(StatusCode::BAD_REQUEST, message)
}

pub fn internal_error(message: impl Into<String>) -> Response {
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// JSON response with an explicit status.
pub fn json<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

/// Binary frame stream response.
pub fn octet_stream(body: axum::body::Body) -> Response {
    (
        [
            (CONTENT_TYPE, "application/octet-stream"),
            (CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}
