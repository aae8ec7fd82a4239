//! The four actors the service runs under one [`wt_core::ActorGroup`]
//!
//! Every actor observes the shared cancellation token passed to `execute`,
//! and every `interrupt` cancels a token, so one finished actor brings the
//! others down promptly.

mod deadline;
mod signal;
mod tunnel;
mod web;

pub use deadline::DeadlineActor;
pub use signal::{OsSignals, SignalActor, SignalEvent, TerminationSignals};
pub use tunnel::TunnelActor;
pub use web::{WebServerActor, DEFAULT_SHUTDOWN_GRACE};

use std::sync::Arc;

use wt_core::{Actor, ServiceError};

/// Actor type run by the service
pub type ServiceActor = Arc<dyn Actor<Error = ServiceError>>;
