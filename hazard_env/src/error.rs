//! Error types for the hazard environment abstraction.

use thiserror::Error;
use tokio::task::JoinError;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An agent task panicked before producing its result
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// An agent task was aborted before producing its result
    #[error("Task cancelled: {0}")]
    TaskCancelled(String),
}

impl EnvError {
    /// Creates a task failure error.
    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}

impl From<JoinError> for EnvError {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            Self::TaskCancelled(err.to_string())
        } else {
            Self::TaskFailed(err.to_string())
        }
    }
}
