use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod watcher;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub traffic_log: TrafficLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Settings for the request/response traffic log.
///
/// `include_headers` and `empty_body_marker` select between the terse and
/// the verbose rendering of the two log records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficLogConfig {
    pub enabled: bool,
    pub include_headers: bool,
    pub empty_body_marker: String,
    /// Substrings removed from every header name before it is rendered.
    pub stripped_header_fragments: Vec<String>,
    /// Upper bound on buffered body bytes. `None` buffers everything.
    pub max_body_bytes: Option<usize>,
}

impl Default for TrafficLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_headers: true,
            empty_body_marker: "[null]".to_string(),
            stripped_header_fragments: Vec::new(),
            max_body_bytes: None,
        }
    }
}

impl AppConfig {
    /// Loads `config_path`, then `TRAFFIC_TAP__*` variables, then `HOST`/`PORT`/`METRICS_PORT`.
    pub fn load_from(config_path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("TRAFFIC_TAP").separator("__"));

        // Override with environment variables if present
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", i64::from(port.parse::<u16>()?))?;
        }
        if let Ok(metrics_port) = std::env::var("METRICS_PORT") {
            builder = builder.set_override("metrics.port", i64::from(metrics_port.parse::<u16>()?))?;
        }

        let settings = builder.build()?;
        let config: AppConfig = settings.try_deserialize()?;
        Ok(config)
    }

    /// Parses a YAML document without consulting the environment.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Yaml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
