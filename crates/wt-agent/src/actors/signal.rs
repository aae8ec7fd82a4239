//! Termination signal watcher

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wt_core::{Actor, ServiceError};

/// A process termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGINT or Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGQUIT
    Quit,
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalEvent::Interrupt => write!(f, "SIGINT"),
            SignalEvent::Terminate => write!(f, "SIGTERM"),
            SignalEvent::Quit => write!(f, "SIGQUIT"),
        }
    }
}

/// Source of termination signals
pub trait TerminationSignals: Send + Sync {
    /// Install handlers and return a channel that yields the first signal.
    ///
    /// Handlers stop forwarding once the receiver is dropped.
    fn register(&self) -> io::Result<mpsc::Receiver<SignalEvent>>;
}

/// The process's real signal handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

impl TerminationSignals for OsSignals {
    #[cfg(unix)]
    fn register(&self) -> io::Result<mpsc::Receiver<SignalEvent>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let event = tokio::select! {
                _ = tx.closed() => return,
                Some(()) = interrupt.recv() => SignalEvent::Interrupt,
                Some(()) = terminate.recv() => SignalEvent::Terminate,
                Some(()) = quit.recv() => SignalEvent::Quit,
                else => return,
            };
            let _ = tx.send(event).await;
        });
        Ok(rx)
    }

    #[cfg(not(unix))]
    fn register(&self) -> io::Result<mpsc::Receiver<SignalEvent>> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => {}
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        let _ = tx.send(SignalEvent::Interrupt).await;
                    }
                    Err(e) => tracing::error!("Ctrl-C handler failed: {}", e),
                },
            }
        });
        Ok(rx)
    }
}

/// Finishes successfully when the process is asked to terminate
pub struct SignalActor {
    signals: Arc<dyn TerminationSignals>,
    cancel: CancellationToken,
}

impl SignalActor {
    pub fn new(signals: Arc<dyn TerminationSignals>, cancel: CancellationToken) -> Self {
        Self { signals, cancel }
    }
}

#[async_trait]
impl Actor for SignalActor {
    type Error = ServiceError;

    fn name(&self) -> &str {
        "signal-watcher"
    }

    async fn execute(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let mut events = self.signals.register().map_err(ServiceError::Signal)?;

        tokio::select! {
            _ = cancel.cancelled() => Err(ServiceError::Cancelled),
            event = events.recv() => match event {
                Some(event) => {
                    tracing::info!("Received {}, shutting down", event);
                    Ok(())
                }
                None => Err(ServiceError::Signal(io::Error::other(
                    "signal source closed",
                ))),
            },
        }
    }

    fn interrupt(&self) {
        self.cancel.cancel();
    }
}
