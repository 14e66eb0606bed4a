//! Production implementation of HazardContext using Tokio.

use crate::HazardContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

/// Production context backed by the Tokio runtime clock.
///
/// Time comes from `tokio::time::Instant`, so a paused test runtime drives
/// it virtually while a normal runtime follows the wall clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across agents.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HazardContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let span = tracing::debug_span!("agent", name = %name);
        tokio::spawn(future.instrument(span))
    }

    fn spawn_blocking<F, R>(&self, name: &str, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let span = tracing::debug_span!("agent", name = %name);
        tokio::task::spawn_blocking(move || span.in_scope(work))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnvError;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tokio_context_spawn_joins() {
        let ctx = TokioContext::shared();
        let value = 21;
        let handle = ctx.spawn("doubler", async move { value * 2 });

        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_tokio_context_spawn_blocking_joins() {
        let ctx = TokioContext::shared();
        let handle = ctx.spawn_blocking("sleeper", || {
            std::thread::sleep(Duration::from_millis(1));
            "done"
        });

        assert_eq!(handle.await.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_task_reports_cancelled() {
        let ctx = TokioContext::shared();
        let handle = ctx.spawn("forever", std::future::pending::<()>());
        handle.abort();

        let err = EnvError::from(handle.await.unwrap_err());
        assert!(matches!(err, EnvError::TaskCancelled(_)));
    }
}
