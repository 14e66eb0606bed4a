//! Error types for the hazard drivers.

use hazard_env::EnvError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the drivers and by the timeout wrapper around them.
///
/// Failing to negotiate a direction is not an error; it is the
/// `AttemptsExhausted` outcome of the negotiation protocol.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The wrapped operation was still blocked when the limit expired
    #[error("Hang: still blocked after {waited:?} (limit {limit:?})")]
    Hang {
        /// Time actually waited before giving up
        waited: Duration,
        /// Limit supplied by the caller
        limit: Duration,
    },

    /// An agent task did not produce a result
    #[error(transparent)]
    Env(#[from] EnvError),

    /// The scenario cannot be set up with the given parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HarnessError {
    /// Creates an invalid configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true if this error is a hang reported by the timeout wrapper.
    pub fn is_hang(&self) -> bool {
        matches!(self, Self::Hang { .. })
    }
}
