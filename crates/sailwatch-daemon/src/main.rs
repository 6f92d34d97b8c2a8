//! Sailwatch daemon: relays boat telemetry to browser viewers.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$SAILWATCH_CONFIG` or `sailwatch.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the broadcast server with the configured markers
//! 4. Attach log forwarding to the server
//! 5. Bind the viewer listener (non-fatal on failure)
//! 6. Publish telemetry on a fixed period until Ctrl-C
//! 7. Stop publishing and close every viewer

mod error;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sailwatch_core::{SailwatchConfig, SharedTelemetry, TelemetrySink, run_telemetry_loop};
use sailwatch_relay::{BroadcastServer, ListenerConfig, RelayConfig, spawn_listener};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::DaemonError;

const CONFIG_ENV: &str = "SAILWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "sailwatch.yaml";

/// Time given to writer tasks to flush close frames before exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging setup or relay construction
/// fails. A listener that cannot bind is not an error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so the source is
    //    reported after step 2.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    let forward = logging::init(&config)?;
    info!(
        source = %source,
        host = %config.server.host,
        port = config.server.port,
        interval_ms = config.telemetry.interval_ms,
        targets = config.markers.targets.len(),
        boundaries = config.markers.boundaries.len(),
        "Configuration loaded"
    );

    // 3. Build the broadcast server.
    let relay = RelayConfig {
        queue_capacity: config.server.queue_capacity,
        max_frame_bytes: config.server.max_frame_bytes,
    };
    let server = Arc::new(
        BroadcastServer::new(config.markers.to_store(), relay).map_err(DaemonError::from)?,
    );

    // 4. Forward log records to viewers.
    if let Some(handle) = &forward {
        handle.attach(&server);
    }

    // 5. Bind the listener.
    let listener = ListenerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let running = spawn_listener(&listener, Arc::clone(&server)).await;
    if running.is_none() {
        warn!("Continuing without a viewer listener");
    }

    // 6. Publish telemetry. Sensor readers update `telemetry`; none are
    //    wired into this binary, so defaults are published.
    let telemetry = SharedTelemetry::default();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sink: Arc<dyn TelemetrySink> = Arc::clone(&server) as Arc<dyn TelemetrySink>;
    let period = config.telemetry.interval();
    let publisher = tokio::spawn(async move {
        run_telemetry_loop(&telemetry, sink.as_ref(), period, shutdown_rx).await
    });

    tokio::signal::ctrl_c().await.map_err(DaemonError::from)?;
    info!("Program terminating");

    // 7. Stop publishing, then close viewers.
    let _ = shutdown_tx.send(true);
    match publisher.await {
        Ok(ticks) => info!(ticks, "Telemetry publisher stopped"),
        Err(e) => warn!(error = %e, "Telemetry publisher task failed"),
    }

    let closed = server.close_all();
    if closed > 0 {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
    if let Some(running) = running {
        running.handle.abort();
    }

    info!(closed, "sailwatch shutdown complete");
    Ok(())
}

/// Load configuration and report where it came from.
///
/// A missing file is not an error: defaults are used, with environment
/// overrides still applied.
fn load_config() -> Result<(SailwatchConfig, String), DaemonError> {
    let path = std::env::var(CONFIG_ENV)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = SailwatchConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        let mut config = SailwatchConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok((config, String::from("defaults")))
    }
}
