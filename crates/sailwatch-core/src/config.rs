//! Configuration loading and typed config structures for the Sailwatch relay.
//!
//! The configuration lives in `sailwatch.yaml` next to the daemon. This
//! module defines strongly-typed structs that mirror the YAML structure and
//! a loader that reads, overrides and validates the file. Every section is
//! optional; missing values fall back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sailwatch_types::{Location, MarkerStore};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SailwatchConfig {
    /// Force debug-level logging regardless of `logging.level`.
    #[serde(default)]
    pub debug: bool,

    /// Listener and per-viewer queue settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Publishing cadence.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static target and boundary markers.
    #[serde(default)]
    pub markers: MarkersConfig,
}

impl SailwatchConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for the listener:
    /// - `SAILWATCH_HOST` overrides `server.host`
    /// - `SAILWATCH_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// No environment overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `SAILWATCH_PORT` is not a port
    /// number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SAILWATCH_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SAILWATCH_PORT") {
            self.server.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                field: String::from("server.port"),
                reason: format!("SAILWATCH_PORT={port}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Check every value that serde alone cannot constrain.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telemetry.interval_ms == 0 {
            return Err(invalid("telemetry.interval_ms", "must be greater than zero"));
        }
        if self.server.queue_capacity == 0 {
            return Err(invalid("server.queue_capacity", "must be greater than zero"));
        }
        if self.server.max_frame_bytes == 0 {
            return Err(invalid("server.max_frame_bytes", "must be greater than zero"));
        }
        check_locations("markers.targets", &self.markers.targets)?;
        check_locations("markers.boundaries", &self.markers.boundaries)?;
        Ok(())
    }

    /// The log level to install, honouring the `debug` switch.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { self.logging.level.as_str() }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

fn check_locations(field: &str, locations: &[Location]) -> Result<(), ConfigError> {
    for (index, location) in locations.iter().enumerate() {
        if !location.is_valid() {
            return Err(ConfigError::Invalid {
                field: format!("{field}[{index}]"),
                reason: format!(
                    "({}, {}) is not a valid latitude/longitude",
                    location.lat, location.lon
                ),
            });
        }
    }
    Ok(())
}

/// Listener and per-viewer queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port for the viewer page and the WebSocket endpoint.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Frames that may wait in one viewer's outbound queue before the
    /// viewer is considered stalled and dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Largest frame a viewer will be sent.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            queue_capacity: default_queue_capacity(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Telemetry publishing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelemetryConfig {
    /// Milliseconds between two published snapshots.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl TelemetryConfig {
    /// The publishing period as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Append log output to this file instead of stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Push log records to connected viewers.
    #[serde(default = "default_true")]
    pub forward_to_viewers: bool,

    /// Least severe level pushed to viewers.
    #[serde(default = "default_log_level")]
    pub forward_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
            forward_to_viewers: true,
            forward_level: default_log_level(),
        }
    }
}

/// Static markers replayed to every viewer on connect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarkersConfig {
    /// Target waypoints in display order.
    #[serde(default)]
    pub targets: Vec<Location>,

    /// Boundary vertices in display order.
    #[serde(default)]
    pub boundaries: Vec<Location>,
}

impl MarkersConfig {
    /// Freeze the configured markers into a [`MarkerStore`].
    pub fn to_store(&self) -> MarkerStore {
        MarkerStore::new(self.targets.clone(), self.boundaries.clone())
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8888
}

const fn default_queue_capacity() -> usize {
    64
}

const fn default_max_frame_bytes() -> usize {
    65_536
}

const fn default_interval_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_true() -> bool {
    true
}
