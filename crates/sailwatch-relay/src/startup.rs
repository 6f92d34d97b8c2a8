//! Tolerant listener startup for embedding in the daemon.
//!
//! [`spawn_listener`] binds the relay port and serves on a background
//! Tokio task. A bind failure is logged and reported as `None` instead of
//! an error: the daemon keeps running degraded (publishing to nobody)
//! rather than exiting because the port is taken.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sailwatch_relay::{spawn_listener, BroadcastServer, ListenerConfig, RelayConfig};
//! use std::sync::Arc;
//!
//! let server = Arc::new(BroadcastServer::new(markers, RelayConfig::default())?);
//! if let Some(running) = spawn_listener(&ListenerConfig::default(), server).await {
//!     // Viewers can connect to running.local_addr.
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::broadcast::BroadcastServer;
use crate::listener::{self, ListenerConfig};

/// A listener serving on a background task.
#[derive(Debug)]
pub struct RunningListener {
    /// The bound address (useful when port `0` was requested).
    pub local_addr: SocketAddr,
    /// The serving task. Abort it to stop accepting connections.
    pub handle: JoinHandle<()>,
}

/// Bind and serve on a background task.
///
/// Returns `None` after logging if the address cannot be bound. Errors
/// raised while serving are logged by the background task.
pub async fn spawn_listener(
    config: &ListenerConfig,
    server: Arc<BroadcastServer>,
) -> Option<RunningListener> {
    let bound = listener::bind(config)
        .await
        .and_then(|tcp| listener::local_addr(&tcp).map(|addr| (tcp, addr)));
    let (tcp, local_addr) = match bound {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "The web server failed to bind to the port");
            return None;
        }
    };

    let handle = tokio::spawn(async move {
        if let Err(e) = listener::serve(tcp, server).await {
            error!(error = %e, "Relay server exited with error");
        }
    });

    info!(%local_addr, "Relay server spawned on background task");
    Some(RunningListener { local_addr, handle })
}
