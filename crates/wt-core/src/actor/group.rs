//! Fail-fast actor supervisor

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::Actor;

/// Lifecycle of one [`ActorGroup::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// `run` has not started any actor yet
    Idle,
    /// Every actor's `execute` is in flight
    Running,
    /// One actor finished; the others are being interrupted and awaited
    Cancelling,
    /// Every actor's `execute` has returned
    Terminated,
}

/// Runs actors concurrently and tears all of them down when the first
/// one returns.
///
/// The group owns the cancellation token handed to every `execute`. Actors
/// that want `interrupt` to stop their peers can hold a clone from
/// [`ActorGroup::token`].
pub struct ActorGroup {
    cancel: CancellationToken,
    state: watch::Sender<GroupState>,
}

impl ActorGroup {
    /// Create a group with a fresh cancellation token
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Create a group around an existing token
    pub fn with_token(cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(GroupState::Idle);
        Self { cancel, state }
    }

    /// The token passed to every actor's `execute`
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Observe state transitions of the upcoming run
    pub fn subscribe(&self) -> watch::Receiver<GroupState> {
        self.state.subscribe()
    }

    /// Run `actors` to completion.
    ///
    /// Returns the result of the first actor to finish, by completion order.
    /// When that happens every actor's `interrupt` is called exactly once and
    /// `run` waits for every remaining `execute` to return; their results are
    /// discarded. A panicking actor counts as a completion and is reported
    /// through `E: From<JoinError>`.
    pub async fn run<E>(self, actors: Vec<Arc<dyn Actor<Error = E>>>) -> Result<(), E>
    where
        E: From<JoinError> + Send + 'static,
    {
        if actors.is_empty() {
            self.state.send_replace(GroupState::Terminated);
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for (index, actor) in actors.iter().enumerate() {
            let actor = Arc::clone(actor);
            let cancel = self.cancel.clone();
            tasks.spawn(async move { (index, actor.execute(cancel).await) });
        }
        self.state.send_replace(GroupState::Running);
        tracing::debug!("Actor group running {} actors", actors.len());

        let Some(first) = tasks.join_next().await else {
            self.state.send_replace(GroupState::Terminated);
            return Ok(());
        };

        self.state.send_replace(GroupState::Cancelling);
        match &first {
            Ok((index, Ok(()))) => {
                tracing::info!("'{}' finished, stopping all services", actors[*index].name());
            }
            Ok((index, Err(_))) => {
                tracing::info!("'{}' failed, stopping all services", actors[*index].name());
            }
            Err(e) => {
                tracing::error!("Actor task failed: {}, stopping all services", e);
            }
        }

        for actor in &actors {
            tracing::debug!("Interrupting '{}'", actor.name());
            actor.interrupt();
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(()))) => {
                    tracing::debug!("'{}' stopped", actors[index].name());
                }
                Ok((index, Err(_))) => {
                    tracing::debug!("'{}' stopped with an error (discarded)", actors[index].name());
                }
                Err(e) => {
                    tracing::warn!("Actor task failed during shutdown: {}", e);
                }
            }
        }

        self.state.send_replace(GroupState::Terminated);
        tracing::debug!("Actor group terminated");

        match first {
            Ok((_, result)) => result,
            Err(e) => Err(E::from(e)),
        }
    }
}

impl Default for ActorGroup {
    fn default() -> Self {
        Self::new()
    }
}
