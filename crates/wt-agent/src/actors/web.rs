//! Local web server actor

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use wt_core::{Actor, ServiceError};

/// How long open connections may keep the server alive after shutdown starts
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Serves the web UI router on the resolved local port
pub struct WebServerActor {
    addr: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
}

impl WebServerActor {
    /// `shutdown` stops the server gracefully; it should also be the token
    /// the router's long-lived handlers watch, or graceful shutdown waits for
    /// them.
    pub fn new(addr: SocketAddr, router: Router, shutdown: CancellationToken) -> Self {
        Self {
            addr,
            router,
            shutdown,
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl Actor for WebServerActor {
    type Error = ServiceError;

    fn name(&self) -> &str {
        "web-server"
    }

    async fn execute(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            tracing::error!("Failed to bind web server on {}: {}", self.addr, e);
            ServiceError::WebServer(e)
        })?;
        tracing::info!("Web server listening on http://{}", self.addr);

        let stopping = CancellationToken::new();
        let shutdown = self.shutdown.clone();
        let signal = {
            let stopping = stopping.clone();
            async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = cancel.cancelled() => {}
                }
                tracing::debug!("Web server shutting down");
                stopping.cancel();
            }
        };

        let serve = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::pin!(serve);

        // Connections still open after the grace period are abandoned
        tokio::select! {
            result = &mut serve => result.map_err(ServiceError::WebServer),
            _ = async {
                stopping.cancelled().await;
                tokio::time::sleep(self.grace).await;
            } => {
                tracing::warn!(
                    "Web server connections still open after {:?}, stopping anyway",
                    self.grace
                );
                Ok(())
            }
        }
    }

    fn interrupt(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_bind_failure_is_web_server_error() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = held.local_addr().unwrap();
        let actor = WebServerActor::new(addr, Router::new(), CancellationToken::new());

        let result = actor.execute(CancellationToken::new()).await;

        assert!(matches!(result, Err(ServiceError::WebServer(_))));
    }

    #[tokio::test]
    async fn test_interrupt_stops_server() {
        let addr = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap()
        };
        let router = Router::new().route("/", get(|| async { "ok" }));
        let actor = std::sync::Arc::new(WebServerActor::new(
            addr,
            router,
            CancellationToken::new(),
        ));

        let running = {
            let actor = actor.clone();
            tokio::spawn(async move { actor.execute(CancellationToken::new()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        actor.interrupt();

        assert!(running.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stalled_request_does_not_block_shutdown() {
        let addr = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap()
        };
        let router = Router::new().route("/hang", get(|| std::future::pending::<&str>()));
        let actor = std::sync::Arc::new(
            WebServerActor::new(addr, router, CancellationToken::new())
                .with_grace(std::time::Duration::from_millis(200)),
        );

        let running = {
            let actor = actor.clone();
            tokio::spawn(async move { actor.execute(CancellationToken::new()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut client,
            b"GET /hang HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        actor.interrupt();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), running)
            .await
            .expect("web server waited for the stalled request")
            .unwrap();
        assert!(result.is_ok());
        drop(client);
    }
}
