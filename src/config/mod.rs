use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{config_invalid, RelayResult};
use crate::events::{EventKind, EVENT_BUFFER_SIZE, EVENT_BUS_CAPACITY};
use crate::stream::ForwardPolicy;

// Default configuration values
const DEFAULT_HOST: &str = "localhost";
const FORWARD_ALL: &str = "*";

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host identifier the client connects to
    #[serde(default = "default_host")]
    pub host: String,
    /// Capacity of the event bus channel
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
    /// Number of recent events kept for replay
    #[serde(default = "default_replay_size")]
    pub replay_size: usize,
    /// Event names the stream client forwards, `"*"` forwards everything
    #[serde(default = "default_forward")]
    pub forward: Vec<String>,
}

// Default functions
fn default_host() -> String {
    std::env::var("STREAM_RELAY_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string())
}

fn default_bus_capacity() -> usize {
    std::env::var("STREAM_RELAY_BUS_CAPACITY")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(EVENT_BUS_CAPACITY)
}

fn default_replay_size() -> usize {
    std::env::var("STREAM_RELAY_REPLAY_SIZE")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(EVENT_BUFFER_SIZE)
}

fn default_forward() -> Vec<String> {
    match std::env::var("STREAM_RELAY_FORWARD") {
        Ok(val) => val
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => vec![EventKind::Track.to_string()],
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            bus_capacity: default_bus_capacity(),
            replay_size: default_replay_size(),
            forward: default_forward(),
        }
    }
}

impl RelayConfig {
    /// Configuration for `host` over an already built bus.
    ///
    /// Nothing is read from the environment; the forward list is `["track"]`.
    pub fn for_host(host: impl Into<String>, bus_capacity: usize, replay_size: usize) -> Self {
        Self {
            host: host.into(),
            bus_capacity,
            replay_size,
            forward: vec![EventKind::Track.to_string()],
        }
    }

    /// Check every field, returning the first problem found
    pub fn validate(&self) -> RelayResult<()> {
        if self.host.trim().is_empty() {
            return Err(config_invalid("host", "must not be empty"));
        }
        if self.bus_capacity == 0 {
            return Err(config_invalid("bus_capacity", "must be greater than zero"));
        }
        if self.forward.is_empty() {
            return Err(config_invalid(
                "forward",
                "must name at least one event or \"*\"",
            ));
        }
        self.forward_policy()?;
        Ok(())
    }

    /// Forward policy described by the `forward` list
    pub fn forward_policy(&self) -> RelayResult<ForwardPolicy> {
        if self.forward.iter().any(|name| name == FORWARD_ALL) {
            return Ok(ForwardPolicy::All);
        }

        let kinds = self
            .forward
            .iter()
            .map(|name| {
                name.parse::<EventKind>()
                    .map_err(|_| config_invalid("forward", format!("unknown event '{}'", name)))
            })
            .collect::<RelayResult<_>>()?;

        Ok(ForwardPolicy::AllowList(kinds))
    }
}

/// Manages configuration stored on disk
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<RelayConfig>>,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from the default location
    pub async fn new() -> RelayResult<Self> {
        Self::with_path(get_config_path()).await
    }

    /// Load from `path`, writing defaults there when the file is missing
    pub async fn with_path(path: impl Into<PathBuf>) -> RelayResult<Self> {
        let config_path = path.into();
        let config = load_or_create_config(&config_path).await?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a clone of the current configuration
    pub async fn get_config(&self) -> RelayConfig {
        self.config.read().await.clone()
    }

    /// Validate, store and persist a new configuration
    pub async fn update_config(&self, new_config: RelayConfig) -> RelayResult<()> {
        new_config.validate()?;
        save_config(&self.config_path, &new_config).await?;
        *self.config.write().await = new_config;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Load the relay configuration from the default location
pub async fn load_config() -> RelayResult<RelayConfig> {
    let config_manager = ConfigManager::new().await?;
    Ok(config_manager.get_config().await)
}

/// Get the path to the configuration file
fn get_config_path() -> PathBuf {
    std::env::var("STREAM_RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("stream-relay.json"))
}

async fn load_or_create_config(path: &Path) -> RelayResult<RelayConfig> {
    if !fs::try_exists(path).await? {
        let default_config = RelayConfig::default();
        default_config.validate()?;
        save_config(path, &default_config).await?;
        info!("Created default configuration at {}", path.display());
        return Ok(default_config);
    }

    let config_str = fs::read_to_string(path).await?;
    let config: RelayConfig = serde_json::from_str(&config_str)?;
    config.validate()?;
    debug!("Loaded configuration from {}", path.display());

    Ok(config)
}

async fn save_config(path: &Path, config: &RelayConfig) -> RelayResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(path, config_str).await?;
    debug!("Saved configuration to {}", path.display());

    Ok(())
}
