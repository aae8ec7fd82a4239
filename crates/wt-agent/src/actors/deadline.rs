//! Absolute runtime ceiling

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use wt_core::{Actor, ServiceError};

/// Fails with [`ServiceError::DeadlineExceeded`] once `max_runtime` elapses
pub struct DeadlineActor {
    max_runtime: Duration,
    cancel: CancellationToken,
}

impl DeadlineActor {
    pub fn new(max_runtime: Duration, cancel: CancellationToken) -> Self {
        Self {
            max_runtime,
            cancel,
        }
    }
}

#[async_trait]
impl Actor for DeadlineActor {
    type Error = ServiceError;

    fn name(&self) -> &str {
        "deadline"
    }

    async fn execute(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ServiceError::Cancelled),
            _ = tokio::time::sleep(self.max_runtime) => {
                tracing::info!("Maximum runtime of {:?} reached", self.max_runtime);
                Err(ServiceError::DeadlineExceeded(self.max_runtime))
            }
        }
    }

    fn interrupt(&self) {
        self.cancel.cancel();
    }
}
