//! Relay HTTP listener lifecycle management.
//!
//! Provides [`bind`] and [`serve`] as separate steps so callers can learn
//! the bound address (or tolerate a bind failure) before serving, and
//! [`start_server`] which does both.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::broadcast::BroadcastServer;
use crate::router::build_router;

/// Where the relay listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on. `0` picks a free port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8888,
        }
    }
}

/// Bind the configured address.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the port is in use, the process lacks
/// the privilege to bind it, or the host does not resolve.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            ServerError::Bind(format!("bind failed on {}:{}: {e}", config.host, config.port))
        })?;

    let addr = local_addr(&listener)?;
    info!(%addr, "The web server successfully bound to the port");
    Ok(listener)
}

/// Serve the relay routes on an already bound listener until the task is
/// cancelled or the listener fails.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(listener: TcpListener, server: Arc<BroadcastServer>) -> Result<(), ServerError> {
    let router = build_router(server);
    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Bind and serve in one step.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(
    config: &ListenerConfig,
    server: Arc<BroadcastServer>,
) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, server).await
}

/// The address a listener is bound to.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the socket cannot report its address.
pub fn local_addr(listener: &TcpListener) -> Result<SocketAddr, ServerError> {
    listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("local address unavailable: {e}")))
}

/// Errors that can occur when starting or running the relay listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
