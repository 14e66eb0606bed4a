//! Scenario runner - enacts hazard scenarios and checks their properties.

use crate::config::SimConfig;
use crate::scenarios::ScenarioId;

use hazard_core::{
    await_with_limit, AgentProgress, AttemptBound, ContentionHarness, ContentionReport, CounterSnapshot,
    Hallway, HarnessError, LivelockConfig, LivelockReport, LockOrder, NegotiationOutcome, OrderedLockPair,
    PairCompletion, Strategy, StrategyResult,
};
use hazard_env::{HazardContext, TokioContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Whether the hazard showed the expected property
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Runtime time spent on the scenario
    pub elapsed: Duration,

    /// Structured observations (absent if the scenario could not run)
    pub report: Option<ScenarioReport>,
}

/// Per-scenario observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioReport {
    Deadlock(DeadlockReport),
    Livelock(LivelockRun),
    Starvation(StarvationReport),
}

/// What the lock-ordering scenario did within its limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockReport {
    /// Acquisition order used
    pub order: LockOrder,

    /// Delay between first and second acquisition
    pub delay: Duration,

    /// Limit after which the run was abandoned
    pub limit: Duration,

    /// True if the agents were still blocked at the limit
    pub hung: bool,

    /// Agent stages when the run ended or was abandoned
    pub progress: Vec<AgentProgress>,

    /// Sums read by the agents, if they finished
    pub completion: Option<PairCompletion>,
}

/// What the negotiation scenario did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivelockRun {
    /// Attempt bound used
    pub bound: AttemptBound,

    /// True if an unbounded run was still going at the limit
    pub hung: bool,

    /// Cadence rounds elapsed
    pub rounds: u64,

    /// Direction counters at the end (or at the limit)
    pub counters: Vec<CounterSnapshot>,

    /// Full per-agent report, if the agents finished
    pub report: Option<LivelockReport>,
}

impl LivelockRun {
    /// Returns true if no agent committed (or nobody ever finished).
    pub fn livelocked(&self) -> bool {
        self.report.as_ref().map_or(self.hung, LivelockReport::is_livelocked)
    }
}

/// What the contention scenario measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarvationReport {
    /// Greedy and polite, run together
    pub contended: ContentionReport,

    /// Polite, run alone for the same budget
    pub solo_polite: StrategyResult,

    /// `solo_polite.loops / contended.polite.loops` (denominator at least 1)
    pub degradation: f64,

    /// Share of total lock hold time taken by the greedy worker
    pub greedy_hold_share: f64,

    /// Required degradation for the scenario to pass
    pub min_degradation: f64,
}

/// Runs hazard scenarios.
pub struct ScenarioRunner<C: HazardContext = TokioContext> {
    /// Runtime context shared by every agent
    ctx: Arc<C>,

    /// Scenario parameters
    config: SimConfig,
}

impl ScenarioRunner<TokioContext> {
    /// Creates a runner on the Tokio context.
    pub fn new(config: SimConfig) -> Self {
        Self::with_context(TokioContext::shared(), config)
    }
}

impl<C: HazardContext> ScenarioRunner<C> {
    /// Creates a runner on an explicit context.
    pub fn with_context(ctx: Arc<C>, config: SimConfig) -> Self {
        Self { ctx, config }
    }

    /// Returns the runner configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs the lock-ordering scenario with no limit.
    ///
    /// With opposed ordering this never returns; wrap it in
    /// [`await_with_limit`] to observe the hang.
    pub async fn simulate_deadlock(&self) -> Result<PairCompletion, HarnessError> {
        OrderedLockPair::new(Arc::clone(&self.ctx), self.config.deadlock.clone())
            .run()
            .await
    }

    /// Runs the negotiation scenario with the given attempt bound.
    ///
    /// With [`AttemptBound::Unbounded`] and symmetric agents this never
    /// returns.
    pub async fn simulate_livelock(&self, bound: AttemptBound) -> Result<LivelockReport, HarnessError> {
        let config = self.config.livelock.clone().with_bound(bound);
        Hallway::new(Arc::clone(&self.ctx), config)?.run().await
    }

    /// Runs greedy against polite for `duration`, then polite alone.
    pub async fn simulate_starvation(&self, duration: Duration) -> Result<StarvationReport, HarnessError> {
        let harness = ContentionHarness::new(Arc::clone(&self.ctx), self.config.starvation.clone());
        let contended = harness.run(duration).await?;
        let solo_polite = harness.run_solo(Strategy::Polite, duration).await?;

        let degradation = solo_polite.loops as f64 / contended.polite.loops.max(1) as f64;
        let total_held = contended.greedy.held + contended.polite.held;
        let greedy_hold_share = if total_held.is_zero() {
            0.0
        } else {
            contended.greedy.held.as_secs_f64() / total_held.as_secs_f64()
        };

        Ok(StarvationReport {
            contended,
            solo_polite,
            degradation,
            greedy_hold_share,
            min_degradation: self.config.min_degradation,
        })
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} ({})", scenario.name(), scenario.code());
        debug!("  {}", scenario.description());

        let started = Instant::now();
        let outcome = match scenario {
            ScenarioId::Deadlock => self.run_deadlock().await,
            ScenarioId::Livelock => self.run_livelock().await,
            ScenarioId::Starvation => self.run_starvation().await,
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok((report, failure_reason)) => ScenarioResult {
                scenario,
                passed: failure_reason.is_none(),
                failure_reason,
                elapsed,
                report: Some(report),
            },
            Err(err) => {
                error!("Scenario {} could not run: {}", scenario.name(), err);
                ScenarioResult {
                    scenario,
                    passed: false,
                    failure_reason: Some(err.to_string()),
                    elapsed,
                    report: None,
                }
            }
        }
    }

    /// Runs every scenario in order.
    pub async fn run_all(&self, scenarios: &[ScenarioId]) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run(*scenario).await);
        }
        results
    }

    /// HZ-001: Deadlock - opposed lock ordering.
    ///
    /// **Assertion**: with opposed ordering the pair is still blocked after
    /// `hang_factor` x delay; with consistent ordering it completes.
    async fn run_deadlock(&self) -> Result<(ScenarioReport, Option<String>), HarnessError> {
        let config = self.config.deadlock.clone();
        let limit = self.config.hang_limit();
        info!("HZ-001: Deadlock - order={:?}, delay={:?}, limit={:?}", config.order, config.delay, limit);

        let pair = OrderedLockPair::new(Arc::clone(&self.ctx), config.clone());
        let (hung, completion) = match await_with_limit(limit, pair.run()).await {
            Ok(done) => (false, Some(done?)),
            Err(HarnessError::Hang { .. }) => (true, None),
            Err(other) => return Err(other),
        };
        let progress = pair.progress();
        for p in &progress {
            debug!("  {} -> {:?}", p.agent, p.stage);
        }

        let failure = match (config.order, hung) {
            (LockOrder::Opposed, true) => {
                info!("✓ Deadlock reproduced: both agents still blocked after {:?}", limit);
                None
            }
            (LockOrder::Opposed, false) => Some(format!(
                "agents completed within {:?}; no deadlock reproduced",
                limit
            )),
            (LockOrder::Consistent, false) => {
                info!("✓ Consistent ordering completed");
                None
            }
            (LockOrder::Consistent, true) => Some(format!(
                "consistent ordering still blocked after {:?}",
                limit
            )),
        };

        let report = DeadlockReport {
            order: config.order,
            delay: config.delay,
            limit,
            hung,
            progress,
            completion,
        };
        Ok((ScenarioReport::Deadlock(report), failure))
    }

    /// HZ-002: Livelock - synchronized claim-and-retreat.
    ///
    /// **Assertion**: every outcome is a commit or an exhausted bound, no
    /// direction is committed by two agents, no counter goes negative, and
    /// symmetric agents under a bound all exhaust. An unbounded run that is
    /// still going at the limit is the expected livelock.
    async fn run_livelock(&self) -> Result<(ScenarioReport, Option<String>), HarnessError> {
        let config = self.config.livelock.clone();
        let bound = config.bound;
        info!(
            "HZ-002: Livelock - {} agents, {} directions, bound={:?}",
            config.agents.len(),
            config.directions.len(),
            bound
        );

        let hallway = Hallway::new(Arc::clone(&self.ctx), config.clone())?;
        let finished = match bound {
            AttemptBound::Limited(_) => Some(hallway.run().await?),
            AttemptBound::Unbounded => match await_with_limit(self.config.livelock_limit, hallway.run()).await {
                Ok(done) => Some(done?),
                Err(HarnessError::Hang { .. }) => None,
                Err(other) => return Err(other),
            },
        };

        let run = LivelockRun {
            bound,
            hung: finished.is_none(),
            rounds: hallway.rounds(),
            counters: hallway.counters(),
            report: finished,
        };
        if run.livelocked() {
            info!("✓ Livelock reproduced: no agent committed in {} rounds", run.rounds);
        } else {
            warn!("Livelock broken: at least one agent committed");
        }
        let failure = livelock_failure(&config, &run);
        Ok((ScenarioReport::Livelock(run), failure))
    }

    /// HZ-003: Starvation - greedy versus polite.
    ///
    /// **Assertion**: polite alone completes at least `min_degradation` x
    /// the loops it completes against the greedy worker.
    async fn run_starvation(&self) -> Result<(ScenarioReport, Option<String>), HarnessError> {
        let duration = self.config.starvation_duration;
        info!(
            "HZ-003: Starvation - budget={:?}, greedy hold={:?}, polite hold={:?} x{}",
            duration,
            self.config.starvation.greedy_hold,
            self.config.starvation.polite_hold,
            self.config.starvation.polite_cycles
        );

        let report = self.simulate_starvation(duration).await?;
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  STARVATION RESULTS:");
        info!("    Greedy loops (contended):  {}", report.contended.greedy.loops);
        info!("    Polite loops (contended):  {}", report.contended.polite.loops);
        info!("    Polite loops (alone):      {}", report.solo_polite.loops);
        info!("    Degradation:               {:.1}x  {}", report.degradation,
            if report.degradation >= report.min_degradation { "✓" } else { "✗" });
        info!("    Greedy share of holds:     {:.0}%", report.greedy_hold_share * 100.0);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let failure = if report.degradation >= report.min_degradation {
            None
        } else {
            Some(format!(
                "polite degradation {:.2}x below required {:.2}x",
                report.degradation, report.min_degradation
            ))
        };
        Ok((ScenarioReport::Starvation(report), failure))
    }
}

/// Checks a negotiation run against the protocol's invariants.
fn livelock_failure(config: &LivelockConfig, run: &LivelockRun) -> Option<String> {
    if let Some(c) = run.counters.iter().find(|c| c.floor < 0) {
        return Some(format!("counter {} went negative ({})", c.direction, c.floor));
    }
    let report = run.report.as_ref()?;

    let violations = report.exclusivity_violations();
    if !violations.is_empty() {
        return Some(format!("directions committed by more than one agent: {:?}", violations));
    }
    if let AttemptBound::Limited(max) = run.bound {
        for agent in &report.agents {
            if let NegotiationOutcome::AttemptsExhausted { attempts } = agent.outcome {
                if attempts != max {
                    return Some(format!("{} gave up after {} of {} attempts", agent.name, attempts, max));
                }
            }
        }
        if config.is_symmetric() && !report.is_livelocked() {
            let committed: Vec<_> = report
                .agents
                .iter()
                .filter(|a| a.outcome.is_committed())
                .map(|a| a.name.as_str())
                .collect();
            return Some(format!(
                "symmetric agents should all exhaust, but {:?} committed (cadence {:?})",
                committed, config.cadence
            ));
        }
    }
    None
}
