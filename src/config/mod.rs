//! Configuration module for the dashboard client
//!
//! This module handles client configuration:
//! - Transport settings (server URL, reconnect policy)
//! - Measurement grid dimensions
//! - Logging filter and optional log file
//!
//! # Config Location
//!
//! The monitor reads `config.toml` from the platform-appropriate data
//! directory under `dev.ats.dashboard` unless a path is given explicitly:
//!
//! - **Linux**: `~/.local/share/dev.ats.dashboard/`
//! - **macOS**: `~/Library/Application Support/dev.ats.dashboard/`
//! - **Windows**: `%APPDATA%\dev.ats.dashboard\`
//!
//! A missing file is not an error; every field has a default.
//!
//! # Example
//!
//! ```ignore
//! use ats_dashboard::config::ClientConfig;
//!
//! let config = ClientConfig::load_or_default(None);
//! assert_eq!(config.transport.url, "ws://localhost:5177/ws");
//! ```

use crate::error::{DashboardError, Result, ResultExt};
use crate::types::{DEFAULT_CHANNEL_COUNT, DEFAULT_DEVICE_COUNT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.ats.dashboard";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default measurement server endpoint
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:5177/ws";

/// Default number of automatic reconnect attempts after a close
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Default delay before an automatic reconnect in milliseconds
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "info,ats_dashboard=debug";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Client Config ====================

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            DashboardError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    /// Load config from `path`, or the default location when `None`
    ///
    /// Falls back to defaults when the file is missing or invalid.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Self::default(),
            },
        };

        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DashboardError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DashboardError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            DashboardError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check values that would make the client unusable
    pub fn validate(&self) -> Result<()> {
        let url = self.transport.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(DashboardError::Config(format!(
                "Server URL must use ws:// or wss://, got '{}'",
                url
            )));
        }
        if self.transport.reconnect_delay_ms == 0 {
            return Err(DashboardError::Config(
                "Reconnect delay must be non-zero".to_string(),
            ));
        }
        if self.grid.devices == 0 || self.grid.channels == 0 {
            return Err(DashboardError::Config(format!(
                "Grid must have at least one device and channel, got {}x{}",
                self.grid.devices, self.grid.channels
            )));
        }
        Ok(())
    }
}

// ==================== Transport Config ====================

/// Connection and reconnect settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebSocket endpoint of the measurement server
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Automatic reconnects allowed after consecutive closes
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay before each automatic reconnect
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

impl TransportConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

// ==================== Grid Config ====================

/// Dimensions of the device × channel matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_devices")]
    pub devices: u32,

    #[serde(default = "default_channels")]
    pub channels: u32,
}

fn default_devices() -> u32 {
    DEFAULT_DEVICE_COUNT
}

fn default_channels() -> u32 {
    DEFAULT_CHANNEL_COUNT
}

impl GridConfig {
    /// Total number of matrix slots
    pub fn slot_count(&self) -> usize {
        self.devices as usize * self.channels as usize
    }

    pub fn device_ids(&self) -> impl Iterator<Item = u32> {
        1..=self.devices
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = u32> {
        1..=self.channels
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            devices: DEFAULT_DEVICE_COUNT,
            channels: DEFAULT_CHANNEL_COUNT,
        }
    }
}

// ==================== Logging Config ====================

/// Tracing output settings for the monitor binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Also write logs to this file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.transport.url, DEFAULT_SERVER_URL);
        assert_eq!(config.transport.max_reconnect_attempts, 3);
        assert_eq!(config.transport.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.grid.slot_count(), 216);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [grid]
            devices = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.devices, 4);
        assert_eq!(config.grid.channels, DEFAULT_CHANNEL_COUNT);
        assert_eq!(config.transport, TransportConfig::default());
        assert!(config.logging.log_file.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.transport.url = "http://localhost:5177/ws".to_string();
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.grid.channels = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.transport.reconnect_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grid_ids() {
        let grid = GridConfig {
            devices: 2,
            channels: 3,
        };
        assert_eq!(grid.device_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(grid.channel_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = ClientConfig::default();
        config.logging.log_file = Some(PathBuf::from("monitor.log"));
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
