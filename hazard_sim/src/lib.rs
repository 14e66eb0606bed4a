//! Hazard Deterministic Simulation Testing (DST) Harness
//!
//! This crate runs the hazard drivers of `hazard_core` as named scenarios,
//! bounds the ones that may never finish, and checks the property each one
//! is meant to exhibit.
//!
//! # Scenarios
//!
//! - **HZ-001 Deadlock**: opposed lock ordering; passes when the pair is
//!   still blocked after `hang_factor` x delay
//! - **HZ-002 Livelock**: synchronized negotiation; passes when every
//!   protocol invariant holds (and, unbounded, when it never ends)
//! - **HZ-003 Starvation**: greedy versus polite; passes when polite
//!   throughput degrades by at least `min_degradation`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                        │
//! │   SimConfig ──► simulate_deadlock / livelock / starvation │
//! │        │                                                  │
//! │  ┌─────▼──────────┐  ┌──────────┐  ┌───────────────────┐  │
//! │  │OrderedLockPair │  │ Hallway  │  │ ContentionHarness │  │
//! │  │ SharedCell x2  │  │ Cadence  │  │   std Mutex       │  │
//! │  └────────────────┘  │ Counters │  └───────────────────┘  │
//! │                      └──────────┘                         │
//! │        └──────── await_with_limit (Hang) ───────┘         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hazard_sim::{ScenarioRunner, SimConfig};
//! use hazard_sim::scenarios::ScenarioId;
//!
//! let runner = ScenarioRunner::new(SimConfig::default());
//! let result = runner.run(ScenarioId::Livelock).await;
//! assert!(result.passed);
//! ```

mod config;
mod error;
mod exporter;
mod runner;
pub mod scenarios;

pub use config::SimConfig;
pub use error::SimError;
pub use exporter::SimExport;
pub use runner::{DeadlockReport, LivelockRun, ScenarioReport, ScenarioResult, ScenarioRunner, StarvationReport};
