//! Hazard Environment Abstraction Layer
//!
//! This crate provides the seam between hazard scenarios and the runtime
//! they execute on. Scenarios never call `tokio::spawn` or
//! `tokio::time::sleep` directly; they go through a [`HazardContext`].
//!
//! # Core Concept: Explicit Context
//!
//! Everything that introduces timing into a scenario is intercepted:
//! - Time (`now()`, `sleep()`)
//! - Agent tasks (`spawn()`, `spawn_blocking()`)
//!
//! Running the same scenario on a paused tokio clock makes every timing
//! window virtual and exact.
//!
//! # Example
//!
//! ```ignore
//! use hazard_env::{HazardContext, TokioContext};
//!
//! let ctx = TokioContext::shared();
//! let handle = ctx.spawn("Alice", async move {
//!     ctx.sleep(Duration::from_millis(5)).await;
//! });
//! handle.await?;
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::HazardContext;
pub use types::{AgentName, Direction};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
