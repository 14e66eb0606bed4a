//! # Hazard Core
//!
//! Instrumented primitives and drivers that *enact* classic concurrency
//! pathologies so their timing, fairness and termination can be asserted.
//!
//! ## Primitives
//!
//! - **CadenceClock**: shared broadcast "tick" that keeps agents in lock-step
//! - **SharedCell**: one integer behind a non-reentrant lock
//! - **DirectionCounter**: atomic count of agents claiming a direction
//!
//! ## Drivers
//!
//! - **NegotiationAgent** / **Hallway**: livelock through synchronized,
//!   symmetric claim-and-retreat
//! - **OrderedLockPair**: deadlock through opposed lock acquisition order
//! - **ContentionHarness**: starvation of a polite lock user by a greedy one
//!
//! Nothing here detects or prevents a hazard. Drivers that may not terminate
//! only ever join; callers bound them with [`await_with_limit`].

pub mod cadence;
pub mod cell;
pub mod contention;
pub mod counter;
pub mod error;
pub mod harness;
pub mod lock_pair;
pub mod negotiation;

pub use cadence::{CadenceClock, CadenceMode};
pub use cell::{CellGuard, SharedCell};
pub use contention::{ContentionConfig, ContentionHarness, ContentionReport, Strategy, StrategyResult};
pub use counter::{CounterSnapshot, DirectionCounter};
pub use error::HarnessError;
pub use harness::{await_with_limit, AgentGroup};
pub use lock_pair::{AgentProgress, AgentStage, LockOrder, LockPairConfig, OrderedLockPair, PairCompletion};
pub use negotiation::{
    AgentReport, AgentSpec, AttemptBound, Hallway, LivelockConfig, LivelockReport, NegotiationAgent,
    NegotiationOutcome, TraceEvent, TraceKind,
};
