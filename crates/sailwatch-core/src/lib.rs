//! Configuration and telemetry publishing for the Sailwatch relay.
//!
//! - [`config`] -- Typed YAML configuration with defaults, environment
//!   overrides and validation
//! - [`telemetry`] -- The source/sink seams between the sensor path and the
//!   relay, plus the fixed-interval publishing loop

pub mod config;
pub mod telemetry;

pub use config::{ConfigError, SailwatchConfig};
pub use telemetry::{SharedTelemetry, TelemetrySink, TelemetrySource, run_telemetry_loop};
