//! Subscriber setup: level filter, console or file output, and the layer
//! that forwards records to viewers.

use std::fs::OpenOptions;
use std::sync::Mutex;

use sailwatch_core::SailwatchConfig;
use sailwatch_relay::{LogForwardHandle, viewer_log_layer};
use tracing::Level;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::error::DaemonError;

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns the
/// handle used to attach viewer forwarding once the relay exists, or
/// `None` when forwarding is disabled.
pub fn init(config: &SailwatchConfig) -> Result<Option<LogForwardHandle>, DaemonError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.effective_log_level()))
        .map_err(|e| DaemonError::Logging {
            message: format!("invalid log level {:?}: {e}", config.effective_log_level()),
        })?;

    let mut layers: Vec<BoxedLayer> = vec![output_layer(config)?];

    let handle = if config.logging.forward_to_viewers {
        let level: Level = config
            .logging
            .forward_level
            .parse()
            .map_err(|e| DaemonError::Logging {
                message: format!("invalid forward level {:?}: {e}", config.logging.forward_level),
            })?;
        let (layer, handle) = viewer_log_layer(level);
        layers.push(layer.boxed());
        Some(handle)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| DaemonError::Logging {
            message: format!("subscriber already installed: {e}"),
        })?;

    Ok(handle)
}

fn output_layer(config: &SailwatchConfig) -> Result<BoxedLayer, DaemonError> {
    let layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let base = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            if config.logging.json {
                base.json().boxed()
            } else {
                base.boxed()
            }
        }
        None if config.logging.json => fmt::layer().json().with_target(true).boxed(),
        None => fmt::layer().with_target(true).boxed(),
    };
    Ok(layer)
}
