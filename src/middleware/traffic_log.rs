use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::{
    error::BodyCaptureError,
    logger::TrafficLogger,
    metrics::{record_exchange, TRAFFIC_METRICS},
    AppState,
};

/// Logs the raw request and response of every exchange passing through the router.
///
/// Install it as the outermost layer so it sees the request before any other
/// middleware and the response after all of them.
pub async fn traffic_log_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, BodyCaptureError> {
    let settings = state.config_watcher.traffic_log().await;

    if !settings.enabled {
        return Ok(next.run(request).await);
    }

    let logger = TrafficLogger::new(settings, state.sink.clone());
    let span = info_span!("traffic", exchange_id = %Uuid::new_v4());

    log_exchange(&logger, request, next).instrument(span).await
}

async fn log_exchange(
    logger: &TrafficLogger,
    request: Request,
    next: Next,
) -> Result<Response, BodyCaptureError> {
    let limit = logger.settings().max_body_bytes.unwrap_or(usize::MAX);

    let (parts, body) = request.into_parts();
    let request_body = to_bytes(body, limit).await.map_err(|e| {
        TRAFFIC_METRICS.failures_total.increment(1);
        BodyCaptureError::Request(e)
    })?;

    logger.log_request(&parts.method, &parts.uri, &parts.headers, &request_body);

    let request_bytes = request_body.len();
    let started = Instant::now();
    let response = next
        .run(Request::from_parts(parts, Body::from(request_body)))
        .await;
    let downstream_seconds = started.elapsed().as_secs_f64();

    let (parts, body) = response.into_parts();
    let response_body = to_bytes(body, limit).await.map_err(|e| {
        TRAFFIC_METRICS.failures_total.increment(1);
        BodyCaptureError::Response(e)
    })?;

    logger.log_response(&parts.headers, &response_body);
    record_exchange(request_bytes, response_body.len(), downstream_seconds);

    let body = if response_body.is_empty() {
        Body::empty()
    } else {
        Body::from(response_body)
    };

    Ok(Response::from_parts(parts, body))
}
