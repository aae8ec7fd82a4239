//! wt-agent: the webssh-tunnel service
//!
//! Exposes a local web terminal and file browser through a remote tunnel
//! server. [`ServiceOrchestrator`] runs four actors under a fail-fast
//! supervisor: the tunnel client, the local web server, a signal watcher
//! and a runtime deadline.

pub mod actors;
pub mod pty;
pub mod service;
pub mod tunnel;
pub mod web;

pub use service::ServiceOrchestrator;
