//! Tunnel client
//!
//! The tunnel exposes the local web server through a remote server. A
//! [`TunnelConnector`] dials the server, [`TunnelClient::listen`] registers
//! the endpoint, and [`serve`] proxies every stream the server opens to the
//! local upstream address until the listener closes or the token fires.

mod framed;

pub use framed::{FramedClient, FramedConnector, FramedListener};

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use wt_core::TunnelError;

/// One proxied visitor connection
pub type TunnelStream = DuplexStream;

/// Dials the tunnel server
#[async_trait]
pub trait TunnelConnector: Send + Sync {
    /// Open a connection to `url`, giving up after `timeout`.
    async fn connect(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Box<dyn TunnelClient>, TunnelError>;
}

/// A connected, not yet registered tunnel client
#[async_trait]
pub trait TunnelClient: Send {
    /// Register `endpoint_id` and start receiving streams for it.
    async fn listen(
        self: Box<Self>,
        cancel: CancellationToken,
        endpoint_id: &str,
    ) -> Result<Box<dyn TunnelListener>, TunnelError>;
}

/// Source of proxied streams for a registered endpoint
#[async_trait]
pub trait TunnelListener: Send {
    /// Next stream opened by the server.
    ///
    /// Returns an error once the tunnel is gone; `TunnelError::Closed` when
    /// the server hung up. Must be cancel-safe.
    async fn accept(&mut self) -> Result<TunnelStream, TunnelError>;
}

/// Proxy every accepted stream to `upstream`.
///
/// Returns `Ok(())` when `cancel` fires and the listener's error when the
/// tunnel goes away. Proxy tasks still running at that point are aborted
/// before returning.
pub async fn serve(
    mut listener: Box<dyn TunnelListener>,
    upstream: SocketAddr,
    cancel: CancellationToken,
) -> Result<(), TunnelError> {
    let mut connections = JoinSet::new();

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Tunnel serve loop cancelled");
                break Ok(());
            }

            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    connections.spawn(proxy(stream, upstream, cancel.clone()));
                }
                Err(e) => break Err(e),
            },

            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    tracing::warn!("Proxy task failed: {}", e);
                }
            }
        }
    };

    if !connections.is_empty() {
        tracing::debug!("Aborting {} open proxy connections", connections.len());
    }
    connections.shutdown().await;
    result
}

async fn proxy(mut stream: TunnelStream, upstream: SocketAddr, cancel: CancellationToken) {
    let mut local = match TcpStream::connect(upstream).await {
        Ok(local) => local,
        Err(e) => {
            tracing::warn!("Failed to reach local upstream {}: {}", upstream, e);
            return;
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => {}
        copied = tokio::io::copy_bidirectional(&mut stream, &mut local) => match copied {
            Ok((to_upstream, to_tunnel)) => tracing::debug!(
                "Proxy connection finished ({} bytes in, {} bytes out)",
                to_upstream,
                to_tunnel
            ),
            Err(e) => tracing::debug!("Proxy connection ended: {}", e),
        },
    }
}
