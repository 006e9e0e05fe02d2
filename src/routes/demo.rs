//! Small handlers that give the traffic log something to look at.

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

pub async fn status() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Returns the request body with the request's content type.
pub async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

pub async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}
