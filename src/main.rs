use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traffic_tap::{
    config::{watcher::ConfigWatcher, AppConfig, DEFAULT_CONFIG_PATH},
    create_app,
    logger::TracingSink,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing()?;

    // Load initial configuration
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let initial_config = AppConfig::load_from(&config_path)?;
    info!("Initial configuration loaded successfully");

    // Initialize metrics before the first traffic metric handle is created
    init_metrics(&initial_config)?;

    let config_watcher = Arc::new(ConfigWatcher::new(&config_path, initial_config.clone())?);

    let config_watcher_clone = config_watcher.clone();
    tokio::spawn(async move {
        let mut reload_rx = config_watcher_clone.subscribe_to_reloads();
        while let Ok(new_config) = reload_rx.recv().await {
            info!(
                enabled = new_config.traffic_log.enabled,
                include_headers = new_config.traffic_log.include_headers,
                "Traffic log settings reloaded"
            );
        }
    });

    let state = AppState::new(config_watcher, Arc::new(TracingSink));
    let app = create_app(state).await;

    let addr = format!("{}:{}", initial_config.server.host, initial_config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("🚀 Traffic tap listening on {}", addr);
    if initial_config.metrics.enabled {
        info!("📊 Metrics available at http://{}:{}/metrics",
              initial_config.server.host, initial_config.metrics.port);
    }
    info!("🔄 Hot-reloading enabled for configuration file: {}", config_path);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() -> Result<()> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::registry();

    match log_format.as_str() {
        "json" => {
            subscriber
                .with(tracing_subscriber::fmt::layer().json())
                .with(tracing_subscriber::EnvFilter::from_default_env())
                .init();
        }
        _ => {
            subscriber
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::EnvFilter::from_default_env())
                .init();
        }
    }

    Ok(())
}

fn init_metrics(config: &AppConfig) -> Result<()> {
    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()?;

        info!("Metrics exporter initialized on port {}", config.metrics.port);
    }

    Ok(())
}
