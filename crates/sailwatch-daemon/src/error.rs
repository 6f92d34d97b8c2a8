//! Error types for the Sailwatch daemon.
//!
//! [`DaemonError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the daemon binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: sailwatch_core::ConfigError,
    },

    /// The relay could not be constructed.
    #[error("relay error: {source}")]
    Relay {
        /// The underlying relay error.
        #[from]
        source: sailwatch_relay::RelayError,
    },

    /// The log subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },

    /// Opening the log file or listening for Ctrl-C failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
