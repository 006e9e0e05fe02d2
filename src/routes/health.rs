use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{config::TrafficLogConfig, AppState};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub server_config: ServerConfigInfo,
    pub traffic_log: TrafficLogConfig,
}

#[derive(Serialize, Deserialize)]
pub struct ServerConfigInfo {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

/// Basic health check endpoint
pub async fn health(State(_state): State<AppState>) -> Json<HealthResponse> {
    info!("Basic health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "traffic-tap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Detailed health check endpoint
///
/// Reports the server settings and the traffic log settings currently in effect,
/// which change when the configuration file is reloaded.
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    info!("Detailed health check requested");

    let config = state.config_watcher.get_config().await;

    Json(DetailedHealthResponse {
        status: "healthy".to_string(),
        service: "traffic-tap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        server_config: ServerConfigInfo {
            host: config.server.host,
            port: config.server.port,
            timeout_seconds: config.server.timeout_seconds,
        },
        traffic_log: config.traffic_log,
    })
}
