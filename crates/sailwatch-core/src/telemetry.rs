//! Telemetry seams and the fixed-interval publishing loop.
//!
//! The sensor path writes the latest vehicle state into a
//! [`SharedTelemetry`]; [`run_telemetry_loop`] samples it on a fixed
//! period and hands each snapshot to a [`TelemetrySink`] (the relay).
//! The sink is injected by the caller, so the loop never looks up a
//! process-wide server handle.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use sailwatch_types::TelemetrySnapshot;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Produces the current vehicle state on demand.
pub trait TelemetrySource: Send + Sync {
    /// Return the most recent snapshot.
    fn snapshot(&self) -> TelemetrySnapshot;
}

/// Consumes snapshots; implemented by the relay server.
///
/// Implementations must not block the caller beyond local relay time.
pub trait TelemetrySink: Send + Sync {
    /// Deliver one snapshot to every current viewer.
    fn publish(&self, snapshot: &TelemetrySnapshot);
}

/// Cloneable handle over the latest vehicle state.
///
/// Sensor readers call [`SharedTelemetry::update`]; the publishing loop
/// reads a copy through [`TelemetrySource::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct SharedTelemetry {
    inner: Arc<RwLock<TelemetrySnapshot>>,
}

impl SharedTelemetry {
    /// Create a handle starting from the given state.
    pub fn new(initial: TelemetrySnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Mutate the current state in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut TelemetrySnapshot),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl TelemetrySource for SharedTelemetry {
    fn snapshot(&self) -> TelemetrySnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publish one snapshot per `period` until `shutdown` turns `true`.
///
/// The first snapshot goes out immediately. Missed ticks are skipped
/// rather than bursted, so a stalled runtime never floods viewers.
/// Shutdown is checked before every tick. Returns the number of
/// snapshots published.
pub async fn run_telemetry_loop(
    source: &dyn TelemetrySource,
    sink: &dyn TelemetrySink,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut published: u64 = 0;

    info!(period = ?period, "Telemetry loop starting");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // A dropped sender also ends the loop.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let snapshot = source.snapshot();
                sink.publish(&snapshot);
                published = published.saturating_add(1);
                debug!(published, timestamp = snapshot.timestamp, "Telemetry published");
            }
        }
    }

    info!(published, "Telemetry loop stopped");
    published
}
