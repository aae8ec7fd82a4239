//! Actors and the fail-fast supervisor that runs them
//!
//! An [`Actor`] is a long-running unit of work. An [`ActorGroup`] runs a set
//! of actors concurrently; as soon as any one of them returns, every actor is
//! interrupted and the group waits for all of them before reporting the first
//! result.
//!
//! # Cancellation contract
//!
//! Interruption is cooperative. The group never aborts a task: an actor whose
//! `execute` ignores both its cancellation token and its `interrupt` call
//! keeps the group from terminating. Every `execute` must therefore select on
//! the token (or on whatever `interrupt` signals) at each blocking wait.

mod group;

pub use group::{ActorGroup, GroupState};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A unit of concurrent work supervised by an [`ActorGroup`]
#[async_trait]
pub trait Actor: Send + Sync {
    /// Error returned when the actor stops abnormally
    type Error: Send + 'static;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run until natural completion, failure, or cancellation of `cancel`.
    async fn execute(&self, cancel: CancellationToken) -> Result<(), Self::Error>;

    /// Ask a running `execute` to stop.
    ///
    /// Called exactly once per run, possibly from another task and possibly
    /// after `execute` already returned, in which case it must be a no-op.
    /// Must not block.
    fn interrupt(&self);
}
