//! Core environment context trait for hazard agents.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the runtime so that hazard scenarios never reach for
/// ambient time or ambient task spawning. Every agent receives the context
/// explicitly.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
///
/// # Determinism
///
/// `now()` and `sleep()` go through the runtime clock. Under a paused tokio
/// clock (`start_paused = true`) virtual time only advances once every task
/// is blocked, which turns timing windows into exact, repeatable values.
#[async_trait]
pub trait HazardContext: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since context creation.
    ///
    /// Used for timing windows and duration measurements.
    fn now(&self) -> Duration;

    /// Suspends the calling task for the given duration.
    ///
    /// This is the interposed "critical-section work" of the scenarios.
    async fn sleep(&self, duration: Duration);

    /// Spawns an agent task.
    ///
    /// The returned handle is join-able and abortable, which is how a
    /// harness gives up on a scenario that never terminates on its own.
    ///
    /// Per-agent parameters must be moved into `future`; the context never
    /// shares mutable state between spawned agents.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static;

    /// Spawns an agent that blocks an OS thread (e.g. holds a
    /// `std::sync::Mutex` while sleeping).
    ///
    /// Blocking agents cannot be aborted; they must bound themselves.
    fn spawn_blocking<F, R>(&self, name: &str, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;
}
