//! ContentionHarness - greedy versus polite use of one lock.
//!
//! Both strategies spend the same wall-clock budget doing "work loops"
//! against a single `std::sync::Mutex`, which makes no fairness promise:
//!
//! - **Greedy**: one acquisition per loop, held for `greedy_hold`.
//! - **Polite**: `polite_cycles` acquisitions per loop, each held for
//!   `polite_hold`.
//!
//! Each polite acquisition is a fresh contention point, so the polite worker
//! loses far more loops to the greedy one than the greedy worker loses to it.
//! Strategies run on blocking threads because they hold the lock while
//! sleeping.

use crate::error::HarnessError;
use crate::harness::AgentGroup;
use hazard_env::{AgentName, HazardContext};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Barrier, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;

/// A lock-usage pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One long hold per work loop
    Greedy,
    /// Several short holds per work loop
    Polite,
}

impl Strategy {
    /// Returns the strategy name.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Greedy => "greedy",
            Strategy::Polite => "polite",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hold durations of both strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentionConfig {
    /// How long the greedy worker holds the lock per loop
    pub greedy_hold: Duration,

    /// How long the polite worker holds the lock per acquisition
    pub polite_hold: Duration,

    /// Polite acquisitions per completed loop
    pub polite_cycles: u32,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            greedy_hold: Duration::from_nanos(3),
            polite_hold: Duration::from_nanos(1),
            polite_cycles: 3,
        }
    }
}

impl ContentionConfig {
    /// Sets both hold durations.
    pub fn with_holds(mut self, greedy: Duration, polite: Duration) -> Self {
        self.greedy_hold = greedy;
        self.polite_hold = polite;
        self
    }

    /// Sets the polite acquisitions per loop.
    pub fn with_polite_cycles(mut self, cycles: u32) -> Self {
        self.polite_cycles = cycles;
        self
    }

    /// Returns `(hold, acquisitions per loop)` for `strategy`.
    fn pattern(&self, strategy: Strategy) -> (Duration, u32) {
        match strategy {
            Strategy::Greedy => (self.greedy_hold, 1),
            Strategy::Polite => (self.polite_hold, self.polite_cycles),
        }
    }
}

/// Work done by one strategy over the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy: Strategy,

    /// Completed work loops
    pub loops: u64,

    /// Lock acquisitions, including those of an unfinished last loop
    pub acquisitions: u64,

    /// Total time spent holding the lock
    pub held: Duration,
}

/// Result of a contended run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentionReport {
    pub duration: Duration,
    pub greedy: StrategyResult,
    pub polite: StrategyResult,
}

/// Runs lock strategies against one shared lock for a fixed budget.
pub struct ContentionHarness<C: HazardContext> {
    ctx: Arc<C>,
    config: ContentionConfig,
}

impl<C: HazardContext> ContentionHarness<C> {
    /// Creates a harness with the given hold durations.
    pub fn new(ctx: Arc<C>, config: ContentionConfig) -> Self {
        Self { ctx, config }
    }

    /// Returns the harness configuration.
    pub fn config(&self) -> &ContentionConfig {
        &self.config
    }

    /// Runs greedy and polite concurrently for `duration`.
    pub async fn run(&self, duration: Duration) -> Result<ContentionReport, HarnessError> {
        let mut results = self.run_strategies(&[Strategy::Greedy, Strategy::Polite], duration).await?;
        let polite = results.pop().ok_or_else(|| HarnessError::invalid("polite worker missing"))?;
        let greedy = results.pop().ok_or_else(|| HarnessError::invalid("greedy worker missing"))?;

        info!("Greedy worker was able to execute {} work loops", greedy.loops);
        info!("Polite worker was able to execute {} work loops", polite.loops);

        Ok(ContentionReport {
            duration,
            greedy,
            polite,
        })
    }

    /// Runs one strategy alone for `duration` (the uncontended baseline).
    pub async fn run_solo(&self, strategy: Strategy, duration: Duration) -> Result<StrategyResult, HarnessError> {
        let result = self
            .run_strategies(&[strategy], duration)
            .await?
            .pop()
            .ok_or_else(|| HarnessError::invalid("worker missing"))?;
        info!("{} worker alone executed {} work loops", strategy, result.loops);
        Ok(result)
    }

    async fn run_strategies(
        &self,
        strategies: &[Strategy],
        duration: Duration,
    ) -> Result<Vec<StrategyResult>, HarnessError> {
        if duration.is_zero() {
            return Err(HarnessError::invalid("contention duration must be non-zero"));
        }
        if self.config.polite_cycles == 0 {
            return Err(HarnessError::invalid("polite cycles must be at least one"));
        }

        let lock = Arc::new(Mutex::new(()));
        let start = Arc::new(Barrier::new(strategies.len()));
        let mut group = AgentGroup::new();
        for &strategy in strategies {
            let (hold, per_loop) = self.config.pattern(strategy);
            let lock = Arc::clone(&lock);
            let start = Arc::clone(&start);
            let handle = self.ctx.spawn_blocking(strategy.name(), move || {
                start.wait();
                work_loops(strategy, &lock, hold, per_loop, duration)
            });
            group.push(AgentName::from(strategy.name()), handle);
        }
        group.join_all().await
    }
}

/// Repeats `per_loop` acquire/hold/release cycles until `budget` elapses.
fn work_loops(
    strategy: Strategy,
    lock: &Mutex<()>,
    hold: Duration,
    per_loop: u32,
    budget: Duration,
) -> StrategyResult {
    let mut loops = 0;
    let mut acquisitions = 0;
    let mut held = Duration::ZERO;

    let begin = Instant::now();
    while begin.elapsed() <= budget {
        for _ in 0..per_loop {
            let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let taken = Instant::now();
            std::thread::sleep(hold);
            held += taken.elapsed();
            drop(guard);
            acquisitions += 1;
        }
        loops += 1;
    }

    StrategyResult {
        strategy,
        loops,
        acquisitions,
        held,
    }
}
