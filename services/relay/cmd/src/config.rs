//! Configuration handling for the relay binary.
//!
//! Values come from a YAML file, then environment variables, then command
//! line flags (applied by `main`), each layer overriding the previous one.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How host suspend/resume signals are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleMode {
    /// The process is always considered foregrounded
    AlwaysActive,
    /// SIGUSR1 suspends, SIGUSR2 resumes
    Signals,
}

/// Relay client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bridge WebSocket URL
    pub bridge_url: String,
    /// Topic to subscribe to
    pub topic: String,
    /// Heartbeat interval as a humantime string, e.g. `30s`
    pub heartbeat_interval: String,
    /// Lifecycle signal source
    pub lifecycle: LifecycleMode,
    /// Send a `sub` envelope for the topic after every connect
    pub subscribe_on_connect: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bridge_url: "ws://localhost:5001".to_string(),
            topic: String::new(),
            heartbeat_interval: "30s".to_string(),
            lifecycle: LifecycleMode::AlwaysActive,
            subscribe_on_connect: true,
        }
    }
}

impl RelayConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RelayConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.heartbeat()?;

        info!(
            "Final relay configuration: bridge={}, topic={}, heartbeat={}, lifecycle={:?}",
            config.bridge_url, config.topic, config.heartbeat_interval, config.lifecycle
        );
        Ok(config)
    }

    /// Parsed heartbeat interval
    pub fn heartbeat(&self) -> Result<Duration> {
        humantime::parse_duration(&self.heartbeat_interval)
            .with_context(|| format!("invalid heartbeat interval {:?}", self.heartbeat_interval))
    }

    /// Apply `RELAY_*` overrides from `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RELAY_BRIDGE_URL") {
            info!("Bridge URL overridden by environment: {}", url);
            self.bridge_url = url;
        }

        if let Some(topic) = lookup("RELAY_TOPIC") {
            info!("Topic overridden by environment: {}", topic);
            self.topic = topic;
        }

        if let Some(interval) = lookup("RELAY_HEARTBEAT_INTERVAL") {
            if humantime::parse_duration(&interval).is_ok() {
                info!("Heartbeat interval overridden by environment: {}", interval);
                self.heartbeat_interval = interval;
            } else {
                warn!("Ignoring invalid RELAY_HEARTBEAT_INTERVAL {:?}", interval);
            }
        }
    }
}
