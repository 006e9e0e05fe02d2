use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod interceptor;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod routes;

use config::watcher::ConfigWatcher;
use logger::LogSink;

#[derive(Clone)]
pub struct AppState {
    pub config_watcher: Arc<ConfigWatcher>,
    pub sink: Arc<dyn LogSink>,
}

impl AppState {
    pub fn new(config_watcher: Arc<ConfigWatcher>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config_watcher,
            sink,
        }
    }
}

/// Builds the router with the traffic log installed outside every other layer.
pub async fn create_app(state: AppState) -> Router {
    let current_config = state.config_watcher.get_config().await;

    Router::new()
        // Health check endpoints
        .route("/health", get(routes::health::health))
        .route("/api/v1/health", get(routes::health::health_detailed))

        // Demo endpoints
        .route("/api/v1/status", get(routes::demo::status))
        .route("/api/v1/echo", post(routes::demo::echo))
        .route("/api/v1/empty", get(routes::demo::empty))

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    current_config.server.timeout_seconds,
                ))),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::traffic_log_middleware,
        ))
        .with_state(state)
}
