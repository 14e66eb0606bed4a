//! Join and timeout plumbing shared by the drivers.
//!
//! Deadlock and livelock scenarios are allowed to never finish. The drivers
//! therefore only ever *join*; bounding the wait is the caller's job, done
//! with [`await_with_limit`]. When the bounded future is dropped the
//! [`AgentGroup`] inside it aborts every agent it still owns.

use crate::error::HarnessError;
use hazard_env::{AgentName, EnvError};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

/// Awaits `future` for at most `limit`.
///
/// Returns `HarnessError::Hang` when the limit expires first. The future is
/// dropped at that point, so anything it owns is torn down.
pub async fn await_with_limit<F>(limit: Duration, future: F) -> Result<F::Output, HarnessError>
where
    F: Future,
{
    let started = Instant::now();
    match tokio::time::timeout(limit, future).await {
        Ok(output) => Ok(output),
        Err(_) => {
            let waited = started.elapsed();
            warn!("Operation still blocked after {:?} (limit {:?})", waited, limit);
            Err(HarnessError::Hang { waited, limit })
        }
    }
}

/// A set of named agent tasks joined in spawn order.
///
/// Dropping the group aborts every task that has not finished.
pub struct AgentGroup<T> {
    handles: Vec<(AgentName, JoinHandle<T>)>,
}

impl<T> AgentGroup<T> {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Adds a spawned agent to the group.
    pub fn push(&mut self, name: AgentName, handle: JoinHandle<T>) {
        self.handles.push((name, handle));
    }

    /// Returns the number of agents in the group.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if the group holds no agents.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every agent and returns their results in spawn order.
    ///
    /// Blocks forever if any agent never finishes.
    pub async fn join_all(mut self) -> Result<Vec<T>, HarnessError> {
        let mut results = Vec::with_capacity(self.handles.len());
        for (name, handle) in self.handles.iter_mut() {
            let output = handle.await.map_err(|err| {
                let err = EnvError::from(err);
                warn!("Agent {} did not finish: {}", name, err);
                err
            })?;
            results.push(output);
        }
        Ok(results)
    }
}

impl<T> Default for AgentGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AgentGroup<T> {
    fn drop(&mut self) {
        for (_, handle) in &self.handles {
            handle.abort();
        }
    }
}
