//! Core error types for webssh-tunnel

use std::time::Duration;

use thiserror::Error;
use wt_protocol::ProtocolError;

/// Configuration-related errors
///
/// These abort startup before any actor is created.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Missing required field
    #[error("Missing required field: {0} (pass --{0} or set {env})", env = .0.to_uppercase())]
    MissingField(&'static str),

    /// The client name cannot be used as a URL path segment
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// Errors raised by the tunnel collaborator
#[derive(Error, Debug)]
pub enum TunnelError {
    /// The remote address could not be turned into host and port
    #[error("Invalid tunnel URL: {0}")]
    InvalidUrl(String),

    /// TCP connection to the tunnel server failed
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting or registering took longer than allowed
    #[error("Timed out after {timeout:?} waiting for {url}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// The server refused the endpoint registration
    #[error("Endpoint '{endpoint}' rejected: {reason}")]
    Rejected { endpoint: String, reason: String },

    /// The server sent something other than what the protocol expects
    #[error("Unexpected message from tunnel server: {0}")]
    UnexpectedMessage(String),

    /// The server closed the tunnel connection
    #[error("Tunnel connection closed by server")]
    Closed,

    /// The shared cancellation token fired before the operation finished
    #[error("Tunnel operation cancelled")]
    Cancelled,

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcome of a service run
///
/// Exactly one of these (or success) is reported per run: the result of the
/// first actor to finish.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Tunnel connect, registration or serving failed
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// The local web server failed to bind or stopped with an error
    #[error("Web server error: {0}")]
    WebServer(#[source] std::io::Error),

    /// OS signal handlers could not be installed
    #[error("Failed to register signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    /// The absolute runtime ceiling elapsed
    #[error("Maximum runtime of {0:?} reached")]
    DeadlineExceeded(Duration),

    /// The shared cancellation token fired
    #[error("Service cancelled")]
    Cancelled,

    /// An actor task panicked
    #[error("Actor task failed: {0}")]
    ActorFailed(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Whether this outcome is a planned shutdown rather than a failure.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::DeadlineExceeded(_) | Self::Cancelled)
    }
}
