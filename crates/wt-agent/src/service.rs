//! Service orchestration
//!
//! Wires the tunnel, web server, signal watcher and deadline watchdog into
//! one [`ActorGroup`] sharing a single cancellation token.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use wt_core::{find_available_port, ActorGroup, Config, ServiceError};

use crate::actors::{
    DeadlineActor, OsSignals, ServiceActor, SignalActor, TerminationSignals, TunnelActor,
    WebServerActor, DEFAULT_SHUTDOWN_GRACE,
};
use crate::tunnel::{FramedConnector, TunnelConnector};
use crate::web::{
    self, AppState, AssetSource, DirAssets, EmbeddedAssets, FileTransfer, LocalFiles, LocalShell,
    TerminalBackend,
};

/// How long the tunnel may take to connect and register
pub const TUNNEL_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the tunnel client and the local web UI until one of them stops
pub struct ServiceOrchestrator {
    config: Config,
    connector: Arc<dyn TunnelConnector>,
    signals: Arc<dyn TerminationSignals>,
    assets: Arc<dyn AssetSource>,
    terminal: Arc<dyn TerminalBackend>,
    files: Arc<dyn FileTransfer>,
    shutdown_grace: Duration,
}

impl ServiceOrchestrator {
    /// Orchestrator with the default collaborators: framed TCP tunnel, OS
    /// signals, assets from `config.assets_dir` (built-in page otherwise),
    /// local shell and local filesystem.
    pub fn new(config: Config) -> Self {
        let assets: Arc<dyn AssetSource> = match &config.assets_dir {
            Some(dir) => Arc::new(DirAssets::new(dir.clone())),
            None => Arc::new(EmbeddedAssets),
        };
        let terminal = Arc::new(LocalShell::new(config.terminal.clone()));

        Self {
            config,
            connector: Arc::new(FramedConnector),
            signals: Arc::new(OsSignals),
            assets,
            terminal,
            files: Arc::new(LocalFiles::new()),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn TunnelConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_signals(mut self, signals: Arc<dyn TerminationSignals>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetSource>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_terminal(mut self, terminal: Arc<dyn TerminalBackend>) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn with_files(mut self, files: Arc<dyn FileTransfer>) -> Self {
        self.files = files;
        self
    }

    /// How long the web server waits for open requests once shutdown starts
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The local web server port, probing for a free one on first use.
    pub fn resolve_local_port(&mut self) -> u16 {
        match self.config.local_port {
            Some(port) => port,
            None => {
                let port = find_available_port();
                tracing::debug!("Selected local port {}", port);
                self.config.local_port = Some(port);
                port
            }
        }
    }

    /// The four service actors, all bound to `token`.
    ///
    /// Order: tunnel, web server, signal watcher, deadline watchdog.
    pub fn build_actors(&mut self, token: &CancellationToken) -> Vec<ServiceActor> {
        let port = self.resolve_local_port();
        let config = Arc::new(self.config.clone());

        let web_shutdown = token.child_token();
        let router = web::router(AppState {
            config: config.clone(),
            assets: self.assets.clone(),
            terminal: self.terminal.clone(),
            files: self.files.clone(),
            cancel: web_shutdown.clone(),
        });

        vec![
            Arc::new(TunnelActor::new(
                self.connector.clone(),
                config.tunnel_url(),
                config.name.clone(),
                SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
                TUNNEL_CONNECT_TIMEOUT,
                token.clone(),
            )) as ServiceActor,
            Arc::new(
                WebServerActor::new(
                    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
                    router,
                    web_shutdown,
                )
                .with_grace(self.shutdown_grace),
            ) as ServiceActor,
            Arc::new(SignalActor::new(self.signals.clone(), token.clone())) as ServiceActor,
            Arc::new(DeadlineActor::new(config.max_runtime, token.clone())) as ServiceActor,
        ]
    }

    /// Run every actor until the first one stops, then shut the rest down.
    ///
    /// Returns the first actor's result; a signal yields `Ok(())`.
    pub async fn start(mut self) -> Result<(), ServiceError> {
        let group = ActorGroup::new();
        let actors = self.build_actors(&group.token());

        let config = &self.config;
        tracing::info!(
            "Starting '{}': tunnel {} -> local port {}",
            config.name,
            config.tunnel_url(),
            config.local_port.unwrap_or_default()
        );
        tracing::info!(
            "Local web UI: http://localhost:{}{}",
            config.local_port.unwrap_or_default(),
            config.base_path()
        );
        if config.requires_auth() {
            tracing::debug!("Basic auth enabled for user '{}'", config.username);
        }

        group.run(actors).await
    }
}
