use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failure of one [`TrafficLogger::intercept`](crate::logger::TrafficLogger::intercept) call.
///
/// The exchange's original body streams are back in place by the time this is returned.
#[derive(Debug, Error)]
pub enum InterceptError<E> {
    #[error("failed to buffer request body: {0}")]
    Buffer(#[source] std::io::Error),

    #[error("failed to copy captured response to the client: {0}")]
    CopyBack(#[source] std::io::Error),

    /// Error returned by the downstream handler, untouched.
    #[error("downstream handler failed: {0}")]
    Downstream(E),
}

impl<E> InterceptError<E> {
    pub fn into_downstream(self) -> Option<E> {
        match self {
            InterceptError::Downstream(e) => Some(e),
            _ => None,
        }
    }
}

/// Body buffering failure inside the axum middleware.
#[derive(Debug, Error)]
pub enum BodyCaptureError {
    #[error("failed to read request body: {0}")]
    Request(#[source] axum::Error),

    #[error("failed to read response body: {0}")]
    Response(#[source] axum::Error),
}

impl IntoResponse for BodyCaptureError {
    fn into_response(self) -> Response {
        let status = match self {
            BodyCaptureError::Request(_) => StatusCode::BAD_REQUEST,
            BodyCaptureError::Response(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({
                "error": status.canonical_reason().unwrap_or("error"),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
