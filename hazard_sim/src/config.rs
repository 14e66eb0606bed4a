//! SimConfig - every injectable parameter of a hazard run.

use hazard_core::{AttemptBound, CadenceMode, ContentionConfig, LivelockConfig, LockOrder, LockPairConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Lock-ordering scenario parameters
    pub deadlock: LockPairConfig,

    /// Hang limit as a multiple of the deadlock delay
    pub hang_factor: u32,

    /// Negotiation scenario parameters (lockstep cadence by default)
    pub livelock: LivelockConfig,

    /// Limit applied to an unbounded negotiation
    pub livelock_limit: Duration,

    /// Hold durations of the contention scenario
    pub starvation: ContentionConfig,

    /// Wall-clock budget of each contention run
    pub starvation_duration: Duration,

    /// Minimum solo/contended polite throughput ratio
    pub min_degradation: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            deadlock: LockPairConfig::default(),
            hang_factor: 2,
            livelock: LivelockConfig::default().with_cadence(CadenceMode::Lockstep),
            livelock_limit: Duration::from_secs(1),
            starvation: ContentionConfig::default(),
            starvation_duration: Duration::from_secs(1),
            min_degradation: 2.0,
        }
    }
}

impl SimConfig {
    /// Returns the limit after which the deadlock scenario counts as hung.
    ///
    /// Consistently ordered agents take turns on the first cell, so the
    /// second one only finishes after two delays; that case gets one extra
    /// delay of headroom.
    pub fn hang_limit(&self) -> Duration {
        let factor = self.hang_factor.max(1);
        match self.deadlock.order {
            LockOrder::Opposed => self.deadlock.delay * factor,
            LockOrder::Consistent => self.deadlock.delay * (factor + 1),
        }
    }

    /// Sets the deadlock delay.
    pub fn with_deadlock_delay(mut self, delay: Duration) -> Self {
        self.deadlock.delay = delay;
        self
    }

    /// Sets the livelock attempt bound.
    pub fn with_attempt_bound(mut self, bound: AttemptBound) -> Self {
        self.livelock.bound = bound;
        self
    }

    /// Sets the livelock cadence.
    pub fn with_cadence(mut self, cadence: CadenceMode) -> Self {
        self.livelock.cadence = cadence;
        self
    }

    /// Sets the contention budget.
    pub fn with_starvation_duration(mut self, duration: Duration) -> Self {
        self.starvation_duration = duration;
        self
    }

    /// Sets the greedy and polite hold durations.
    pub fn with_holds(mut self, greedy: Duration, polite: Duration) -> Self {
        self.starvation = self.starvation.with_holds(greedy, polite);
        self
    }

    /// Sets the required polite throughput degradation.
    pub fn with_min_degradation(mut self, ratio: f64) -> Self {
        self.min_degradation = ratio;
        self
    }
}
