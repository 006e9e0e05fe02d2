use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use super::{AppConfig, TrafficLogConfig};

pub struct ConfigWatcher {
    config: Arc<RwLock<AppConfig>>,
    _watcher: Option<RecommendedWatcher>,
    reload_tx: broadcast::Sender<AppConfig>,
}

impl ConfigWatcher {
    /// Watches `config_path` and swaps in the reloaded config on every modification.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config_path: &str, initial_config: AppConfig) -> Result<Self> {
        let config = Arc::new(RwLock::new(initial_config));
        let (reload_tx, _) = broadcast::channel(16);

        let handle = Handle::try_current()?;
        let path = config_path.to_string();
        let config_clone = config.clone();
        let reload_tx_clone = reload_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if event.kind.is_modify() => {
                    info!("Configuration file changed, reloading...");

                    match AppConfig::load_from(&path) {
                        Ok(new_config) => {
                            let config_clone = config_clone.clone();
                            let reload_tx_clone = reload_tx_clone.clone();

                            handle.spawn(async move {
                                *config_clone.write().await = new_config.clone();

                                if let Err(e) = reload_tx_clone.send(new_config) {
                                    warn!("No active config reload subscribers: {}", e);
                                } else {
                                    info!("Configuration reloaded successfully");
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
            Config::default(),
        )?;

        watcher.watch(Path::new(config_path), RecursiveMode::NonRecursive)?;
        info!("Started watching configuration file: {}", config_path);

        Ok(ConfigWatcher {
            config,
            _watcher: Some(watcher),
            reload_tx,
        })
    }

    /// A watcher with no backing file; the config only changes through [`ConfigWatcher::replace`].
    pub fn detached(config: AppConfig) -> Self {
        let (reload_tx, _) = broadcast::channel(16);

        ConfigWatcher {
            config: Arc::new(RwLock::new(config)),
            _watcher: None,
            reload_tx,
        }
    }

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    pub async fn traffic_log(&self) -> TrafficLogConfig {
        self.config.read().await.traffic_log.clone()
    }

    pub async fn replace(&self, new_config: AppConfig) {
        *self.config.write().await = new_config.clone();
        // Nobody listening is fine.
        let _ = self.reload_tx.send(new_config);
    }

    pub fn subscribe_to_reloads(&self) -> broadcast::Receiver<AppConfig> {
        self.reload_tx.subscribe()
    }
}
