//! Forward `tracing` events to connected viewers as `log` frames.
//!
//! The subscriber is installed before the server exists, so the layer
//! starts detached and is pointed at a server later through its
//! [`LogForwardHandle`]. Events emitted by this crate, or by the HTTP and
//! `WebSocket` stack that writes the frames, are never forwarded: writing a
//! forwarded record would otherwise log again and trigger another fan-out.
//! Records bridged from the `log` crate are matched on their original
//! target.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock, Weak};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::broadcast::BroadcastServer;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Crates on the frame write path. Their events are never forwarded.
const TRANSPORT_TARGETS: &[&str] = &[
    "axum",
    "hyper",
    "hyper_util",
    "mio",
    "tokio",
    "tokio_tungstenite",
    "tower_http",
    "tungstenite",
];

/// Field carrying the original target of a record bridged from `log`.
const LOG_TARGET_FIELD: &str = "log.target";

/// Whether `target` lies inside this crate or the transport stack.
fn is_excluded(target: &str) -> bool {
    std::iter::once(OWN_TARGET)
        .chain(TRANSPORT_TARGETS.iter().copied())
        .any(|krate| {
            target
                .strip_prefix(krate)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
}

type Slot = Arc<OnceLock<Weak<BroadcastServer>>>;

/// Create a detached layer forwarding events at `max_level` or more severe,
/// plus the handle that attaches it to a server.
pub fn viewer_log_layer(max_level: Level) -> (ViewerLogLayer, LogForwardHandle) {
    let slot: Slot = Arc::new(OnceLock::new());
    let layer = ViewerLogLayer {
        slot: Arc::clone(&slot),
        max_level,
    };
    (layer, LogForwardHandle { slot })
}

/// `tracing_subscriber` layer that pushes log records to viewers.
#[derive(Debug, Clone)]
pub struct ViewerLogLayer {
    slot: Slot,
    max_level: Level,
}

/// Attaches a [`ViewerLogLayer`] to a running server.
#[derive(Debug, Clone)]
pub struct LogForwardHandle {
    slot: Slot,
}

impl LogForwardHandle {
    /// Start forwarding to `server`.
    ///
    /// Only the first attachment takes effect; returns `false` if the
    /// layer was already attached. The layer holds a weak reference, so
    /// forwarding stops once the server is dropped.
    pub fn attach(&self, server: &Arc<BroadcastServer>) -> bool {
        self.slot.set(Arc::downgrade(server)).is_ok()
    }
}

impl<S: Subscriber> Layer<S> for ViewerLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level || is_excluded(meta.target()) {
            return;
        }
        let Some(server) = self.slot.get().and_then(Weak::upgrade) else {
            return;
        };
        if server.viewer_count() == 0 {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.log_target.as_deref().is_some_and(is_excluded) {
            return;
        }
        server.broadcast_log(&meta.level().to_string(), &visitor.finish());
    }
}

/// Renders the `message` field followed by any other fields as `key=value`.
/// The `log.*` metadata fields of bridged records are not rendered.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
    log_target: Option<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => value.clone_into(&mut self.message),
            LOG_TARGET_FIELD => self.log_target = Some(value.to_owned()),
            name if name.starts_with("log.") => {}
            name => self.push_field(name, &value),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            LOG_TARGET_FIELD => self.log_target = Some(format!("{value:?}")),
            name if name.starts_with("log.") => {}
            name => self.push_field(name, &format_args!("{value:?}")),
        }
    }
}
