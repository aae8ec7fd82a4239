//! Tunnel bootstrap actor

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use wt_core::{Actor, ServiceError, TunnelError};

use crate::tunnel::{self, TunnelConnector};

/// Connects to the tunnel server, registers the client name and proxies
/// visitor streams to the local web server.
pub struct TunnelActor {
    connector: Arc<dyn TunnelConnector>,
    url: String,
    endpoint_id: String,
    upstream: SocketAddr,
    connect_timeout: Duration,
    cancel: CancellationToken,
}

impl TunnelActor {
    pub fn new(
        connector: Arc<dyn TunnelConnector>,
        url: String,
        endpoint_id: String,
        upstream: SocketAddr,
        connect_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            url,
            endpoint_id,
            upstream,
            connect_timeout,
            cancel,
        }
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), TunnelError> {
        let client = tokio::select! {
            _ = cancel.cancelled() => return Err(TunnelError::Cancelled),
            client = self.connector.connect(&self.url, self.connect_timeout) => client?,
        };

        let listener = client.listen(cancel.clone(), &self.endpoint_id).await?;
        tracing::info!(
            "Tunnel ready: '{}' -> {}",
            self.endpoint_id,
            self.upstream
        );

        tunnel::serve(listener, self.upstream, cancel).await
    }
}

#[async_trait]
impl Actor for TunnelActor {
    type Error = ServiceError;

    fn name(&self) -> &str {
        "tunnel"
    }

    async fn execute(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        match self.run(cancel).await {
            Ok(()) => Ok(()),
            Err(TunnelError::Cancelled) => Err(ServiceError::Cancelled),
            Err(e) => {
                tracing::error!("Tunnel failed: {}", e);
                Err(e.into())
            }
        }
    }

    fn interrupt(&self) {
        self.cancel.cancel();
    }
}
