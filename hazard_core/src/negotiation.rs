//! NegotiationAgent - the livelock protocol.
//!
//! Agents meeting in a hallway each try to step aside. Per direction:
//!
//! ```text
//! claim(d) ── tick ── count(d) == 1 ? ──yes──► Committed(d)
//!                          │
//!                          no
//!                          │
//!                        tick ── release(d) ──► next direction
//! ```
//!
//! After retreating from the last direction an agent counts one attempt and
//! starts over with its first one. When every agent acts on the same tick
//! none of them ever observes a stable moment, so with symmetric agents the
//! exchange repeats until the attempt bound runs out.

use crate::cadence::{CadenceClock, CadenceMode};
use crate::counter::{CounterSnapshot, DirectionCounter};
use crate::error::HarnessError;
use crate::harness::AgentGroup;
use hazard_env::{AgentName, Direction, HazardContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// How many full direction cycles an agent may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptBound {
    /// Give up after this many cycles
    Limited(u32),

    /// Never give up
    Unbounded,
}

impl AttemptBound {
    /// Returns true if `attempts` completed cycles exhaust the bound.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        match self {
            AttemptBound::Limited(max) => attempts >= *max,
            AttemptBound::Unbounded => false,
        }
    }
}

impl Default for AttemptBound {
    fn default() -> Self {
        AttemptBound::Limited(5)
    }
}

/// One participant of the negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent name, used in traces
    pub name: AgentName,

    /// Index of the direction this agent tries first
    pub preference_offset: usize,
}

impl AgentSpec {
    /// Creates an agent that starts with the first direction.
    pub fn new(name: impl Into<AgentName>) -> Self {
        Self {
            name: name.into(),
            preference_offset: 0,
        }
    }

    /// Starts this agent at a different direction.
    pub fn with_preference_offset(mut self, offset: usize) -> Self {
        self.preference_offset = offset;
        self
    }
}

/// Parameters of the livelock scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivelockConfig {
    /// Participants, spawned in order
    pub agents: Vec<AgentSpec>,

    /// Directions, tried in order starting at each agent's offset
    pub directions: Vec<Direction>,

    /// Attempt bound per agent
    pub bound: AttemptBound,

    /// Cadence drive mode
    pub cadence: CadenceMode,
}

impl Default for LivelockConfig {
    fn default() -> Self {
        Self {
            agents: vec![AgentSpec::new("Alice"), AgentSpec::new("Barbara")],
            directions: vec![Direction::from("left"), Direction::from("right")],
            bound: AttemptBound::default(),
            cadence: CadenceMode::default(),
        }
    }
}

impl LivelockConfig {
    /// Sets the attempt bound.
    pub fn with_bound(mut self, bound: AttemptBound) -> Self {
        self.bound = bound;
        self
    }

    /// Sets the cadence mode.
    pub fn with_cadence(mut self, cadence: CadenceMode) -> Self {
        self.cadence = cadence;
        self
    }

    /// Replaces the participants.
    pub fn with_agents(mut self, agents: Vec<AgentSpec>) -> Self {
        self.agents = agents;
        self
    }

    /// Replaces the directions.
    pub fn with_directions<D: Into<Direction>>(mut self, directions: impl IntoIterator<Item = D>) -> Self {
        self.directions = directions.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if two or more agents start at the same direction.
    ///
    /// Symmetric agents acting on a shared cadence can never observe an
    /// exclusive claim, so a bounded run is expected to exhaust.
    pub fn is_symmetric(&self) -> bool {
        let width = self.directions.len().max(1);
        match self.agents.split_first() {
            Some((first, rest)) if !rest.is_empty() => rest
                .iter()
                .all(|a| a.preference_offset % width == first.preference_offset % width),
            _ => false,
        }
    }

    fn validate(&self) -> Result<(), HarnessError> {
        if self.agents.is_empty() {
            return Err(HarnessError::invalid("livelock needs at least one agent"));
        }
        if self.directions.is_empty() {
            return Err(HarnessError::invalid("livelock needs at least one direction"));
        }
        if let CadenceMode::Periodic(period) = self.cadence {
            if period.is_zero() {
                return Err(HarnessError::invalid("cadence period must be non-zero"));
            }
        }
        Ok(())
    }
}

/// What happened at one step of an agent's protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// Claimed a direction
    Attempted,
    /// Observed an exclusive claim
    Committed,
    /// Observed company and released the claim
    Retreated,
    /// Ran out of attempts
    GaveUp,
}

/// One entry of an agent's trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Cadence round the event happened in
    pub round: u64,

    /// Protocol step
    pub kind: TraceKind,

    /// Direction involved (none for `GaveUp`)
    pub direction: Option<Direction>,

    /// Counter value the agent observed at this step
    pub observed: i32,
}

/// Final state of one negotiating agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NegotiationOutcome {
    /// Secured an exclusive claim on `direction`
    Committed {
        direction: Direction,
        /// Zero-based cycle the claim happened in
        attempt: u32,
        /// Cadence round of the successful check
        round: u64,
    },

    /// Gave up after `attempts` full cycles
    AttemptsExhausted { attempts: u32 },
}

impl NegotiationOutcome {
    /// Returns true if the agent committed to a direction.
    pub fn is_committed(&self) -> bool {
        matches!(self, NegotiationOutcome::Committed { .. })
    }
}

/// Outcome plus full trace of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReport {
    pub name: AgentName,
    pub outcome: NegotiationOutcome,
    pub trace: Vec<TraceEvent>,
}

impl AgentReport {
    /// Renders the trace as a single human-readable line.
    ///
    /// `Alice is trying to scoot: left right left. Success!`
    pub fn render(&self) -> String {
        let mut out = format!("{} is trying to scoot:", self.name);
        for event in &self.trace {
            match (event.kind, &event.direction) {
                (TraceKind::Attempted, Some(direction)) => {
                    let _ = write!(out, " {}", direction);
                }
                (TraceKind::Committed, _) => out.push_str(". Success!"),
                _ => {}
            }
        }
        if let NegotiationOutcome::AttemptsExhausted { .. } = self.outcome {
            let _ = write!(out, "\n{} tosses their hands up in exasperation!", self.name);
        }
        out
    }

    /// Returns the directions attempted, in order.
    pub fn attempted(&self) -> Vec<&Direction> {
        self.trace
            .iter()
            .filter(|e| e.kind == TraceKind::Attempted)
            .filter_map(|e| e.direction.as_ref())
            .collect()
    }
}

/// Result of a full negotiation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivelockReport {
    /// One report per agent, in spawn order
    pub agents: Vec<AgentReport>,

    /// Cadence rounds elapsed during the run
    pub rounds: u64,

    /// Final state of every direction counter
    pub counters: Vec<CounterSnapshot>,
}

impl LivelockReport {
    /// Returns true if no agent managed to commit.
    pub fn is_livelocked(&self) -> bool {
        self.agents.iter().all(|a| !a.outcome.is_committed())
    }

    /// Returns the directions committed to by more than one agent.
    ///
    /// A committed claim is never released, so two commits to one direction
    /// break mutual exclusion whatever rounds they happened in. Empty when
    /// mutual exclusion held.
    pub fn exclusivity_violations(&self) -> Vec<Direction> {
        let mut commits: BTreeMap<&Direction, usize> = BTreeMap::new();
        for agent in &self.agents {
            if let NegotiationOutcome::Committed { direction, .. } = &agent.outcome {
                *commits.entry(direction).or_default() += 1;
            }
        }
        commits
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(direction, _)| direction.clone())
            .collect()
    }
}

/// Drives one agent through the protocol.
///
/// Owns its name, its trace and its attempt counter; everything shared
/// (clock, counters) is handed in explicitly.
pub struct NegotiationAgent {
    name: AgentName,
    clock: Arc<CadenceClock>,
    counters: Arc<[Arc<DirectionCounter>]>,
    preference_offset: usize,
    bound: AttemptBound,
    round: u64,
    trace: Vec<TraceEvent>,
}

impl NegotiationAgent {
    /// Creates an agent over the given clock and counters.
    pub fn new(
        spec: AgentSpec,
        clock: Arc<CadenceClock>,
        counters: Arc<[Arc<DirectionCounter>]>,
        bound: AttemptBound,
    ) -> Self {
        Self {
            name: spec.name,
            clock,
            counters,
            preference_offset: spec.preference_offset,
            bound,
            round: 0,
            trace: Vec::new(),
        }
    }

    /// Runs the protocol to commit or exhaustion.
    ///
    /// With [`AttemptBound::Unbounded`] and symmetric competitors this never
    /// returns.
    pub async fn negotiate(mut self) -> AgentReport {
        let outcome = self.negotiate_inner().await;
        self.clock.leave();
        AgentReport {
            name: self.name,
            outcome,
            trace: self.trace,
        }
    }

    async fn negotiate_inner(&mut self) -> NegotiationOutcome {
        let width = self.counters.len();
        let start = self.preference_offset % width;
        let mut attempts = 0u32;
        loop {
            if self.bound.is_exhausted(attempts) {
                self.record(TraceKind::GaveUp, None, 0);
                info!("{} gives up after {} attempts", self.name, attempts);
                return NegotiationOutcome::AttemptsExhausted { attempts };
            }
            for step in 0..width {
                let counter = Arc::clone(&self.counters[(start + step) % width]);
                if self.try_direction(&counter).await {
                    info!("{} committed to {} on attempt {}", self.name, counter.direction(), attempts);
                    return NegotiationOutcome::Committed {
                        direction: counter.direction().clone(),
                        attempt: attempts,
                        round: self.round,
                    };
                }
            }
            attempts += 1;
        }
    }

    /// One claim/check/release step. Returns true on an exclusive claim.
    async fn try_direction(&mut self, counter: &DirectionCounter) -> bool {
        let claimed = counter.claim();
        self.record(TraceKind::Attempted, Some(counter.direction()), claimed);

        self.round = self.clock.tick().await;
        let observed = counter.load();
        if observed == 1 {
            self.record(TraceKind::Committed, Some(counter.direction()), observed);
            return true;
        }

        // Finish the step before stepping back.
        self.round = self.clock.tick().await;
        let remaining = counter.release();
        self.record(TraceKind::Retreated, Some(counter.direction()), observed);
        debug!(
            "{} retreats from {} (saw {}, {} left)",
            self.name,
            counter.direction(),
            observed,
            remaining
        );
        false
    }

    fn record(&mut self, kind: TraceKind, direction: Option<&Direction>, observed: i32) {
        self.trace.push(TraceEvent {
            round: self.round,
            kind,
            direction: direction.cloned(),
            observed,
        });
    }
}

/// A negotiation scenario: one clock, one counter per direction, N agents.
///
/// One-shot: the clock and counters carry the state of the run, so a
/// second `run()` is rejected.
pub struct Hallway<C: HazardContext> {
    ctx: Arc<C>,
    config: LivelockConfig,
    clock: Arc<CadenceClock>,
    counters: Arc<[Arc<DirectionCounter>]>,
    started: AtomicBool,
}

impl<C: HazardContext> Hallway<C> {
    /// Builds the clock and counters for `config`.
    pub fn new(ctx: Arc<C>, config: LivelockConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        let clock = Arc::new(CadenceClock::with_mode(&ctx, config.cadence, config.agents.len()));
        let counters: Arc<[Arc<DirectionCounter>]> = config
            .directions
            .iter()
            .map(|d| Arc::new(DirectionCounter::new(d.clone())))
            .collect();
        Ok(Self {
            ctx,
            config,
            clock,
            counters,
            started: AtomicBool::new(false),
        })
    }

    /// Returns the current state of every direction counter.
    pub fn counters(&self) -> Vec<CounterSnapshot> {
        self.counters.iter().map(|c| c.snapshot()).collect()
    }

    /// Returns the cadence rounds elapsed so far.
    pub fn rounds(&self) -> u64 {
        self.clock.rounds()
    }

    /// Spawns every agent and waits for all of them.
    ///
    /// Dropping the returned future aborts the agents. Fails with
    /// `InvalidConfig` if the hallway already ran.
    pub async fn run(&self) -> Result<LivelockReport, HarnessError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HarnessError::invalid("hallway already ran; build a new one per run"));
        }
        info!(
            "Hallway: {} agents, {} directions, bound={:?}, cadence={:?}",
            self.config.agents.len(),
            self.counters.len(),
            self.config.bound,
            self.config.cadence
        );

        let mut group = AgentGroup::new();
        for spec in self.config.agents.iter().cloned() {
            let name = spec.name.clone();
            let agent = NegotiationAgent::new(
                spec,
                Arc::clone(&self.clock),
                Arc::clone(&self.counters),
                self.config.bound,
            );
            let handle = self.ctx.spawn(name.as_str(), agent.negotiate());
            group.push(name, handle);
        }

        let agents = group.join_all().await?;
        for report in &agents {
            info!("{}", report.render());
        }

        Ok(LivelockReport {
            agents,
            rounds: self.clock.rounds(),
            counters: self.counters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::await_with_limit;
    use hazard_env::TokioContext;
    use std::time::Duration;

    fn lockstep(bound: AttemptBound) -> LivelockConfig {
        LivelockConfig::default()
            .with_cadence(CadenceMode::Lockstep)
            .with_bound(bound)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_symmetric_agents_exhaust_attempts() {
        let ctx = TokioContext::shared();
        let hallway = Hallway::new(ctx, lockstep(AttemptBound::Limited(5))).unwrap();
        let report = hallway.run().await.unwrap();

        assert!(report.is_livelocked());
        for agent in &report.agents {
            assert_eq!(agent.outcome, NegotiationOutcome::AttemptsExhausted { attempts: 5 });

            let attempted: Vec<&str> = agent.attempted().iter().map(|d| d.as_str()).collect();
            let expected: Vec<&str> = ["left", "right"].iter().cycle().take(10).copied().collect();
            assert_eq!(attempted, expected);

            // Every check saw both agents.
            assert!(agent
                .trace
                .iter()
                .filter(|e| e.kind == TraceKind::Retreated)
                .all(|e| e.observed == 2));
        }

        // Both agents moved through identical rounds.
        let rounds = |r: &AgentReport| r.trace.iter().map(|e| e.round).collect::<Vec<_>>();
        assert_eq!(rounds(&report.agents[0]), rounds(&report.agents[1]));

        // 5 cycles x 2 directions x 2 ticks.
        assert_eq!(report.rounds, 20);
        for counter in &report.counters {
            assert_eq!(counter.count, 0);
            assert_eq!(counter.peak, 2);
            assert_eq!(counter.floor, 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_matches_hallway_story() {
        let ctx = TokioContext::shared();
        let hallway = Hallway::new(ctx, lockstep(AttemptBound::Limited(2))).unwrap();
        let report = hallway.run().await.unwrap();

        assert_eq!(
            report.agents[0].render(),
            "Alice is trying to scoot: left right left right\n\
             Alice tosses their hands up in exasperation!"
        );
    }

    #[tokio::test]
    async fn test_single_agent_commits_immediately() {
        let ctx = TokioContext::shared();
        let config = lockstep(AttemptBound::Limited(5)).with_agents(vec![AgentSpec::new("Alice")]);
        let report = Hallway::new(ctx, config).unwrap().run().await.unwrap();

        let alice = &report.agents[0];
        assert_eq!(
            alice.outcome,
            NegotiationOutcome::Committed { direction: "left".into(), attempt: 0, round: 1 }
        );
        assert_eq!(alice.render(), "Alice is trying to scoot: left. Success!");
        // The committed claim is never released.
        assert_eq!(report.counters[0].count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_offset_preferences_break_symmetry() {
        let ctx = TokioContext::shared();
        let config = lockstep(AttemptBound::Limited(5)).with_agents(vec![
            AgentSpec::new("Alice"),
            AgentSpec::new("Barbara").with_preference_offset(1),
        ]);
        let report = Hallway::new(ctx, config).unwrap().run().await.unwrap();

        assert!(report.agents.iter().all(|a| a.outcome.is_committed()));
        assert!(report.exclusivity_violations().is_empty());
        assert_eq!(report.rounds, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_three_agents_over_two_directions_never_share_a_commit() {
        let ctx = TokioContext::shared();
        let config = lockstep(AttemptBound::Limited(3)).with_agents(vec![
            AgentSpec::new("Alice"),
            AgentSpec::new("Barbara").with_preference_offset(1),
            AgentSpec::new("Carol"),
        ]);
        let report = Hallway::new(ctx, config).unwrap().run().await.unwrap();

        assert!(report.exclusivity_violations().is_empty());
        for counter in &report.counters {
            assert!(counter.floor >= 0);
            assert!(counter.peak <= 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_symmetric_negotiation_never_terminates() {
        let ctx = TokioContext::shared();
        let hallway = Hallway::new(ctx, LivelockConfig::default().with_bound(AttemptBound::Unbounded)).unwrap();

        let result = await_with_limit(Duration::from_secs(1), hallway.run()).await;
        assert!(result.unwrap_err().is_hang());
        assert!(hallway.rounds() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_cadence_reports_valid_outcomes() {
        let ctx = TokioContext::shared();
        let hallway = Hallway::new(ctx, LivelockConfig::default()).unwrap();
        let report = await_with_limit(Duration::from_secs(1), hallway.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.agents.len(), 2);
        assert!(report.exclusivity_violations().is_empty());
        for counter in &report.counters {
            assert!(counter.floor >= 0);
        }
    }

    #[tokio::test]
    async fn test_zero_bound_gives_up_without_claiming() {
        let ctx = TokioContext::shared();
        let report = Hallway::new(ctx, lockstep(AttemptBound::Limited(0)))
            .unwrap()
            .run()
            .await
            .unwrap();

        for agent in &report.agents {
            assert_eq!(agent.outcome, NegotiationOutcome::AttemptsExhausted { attempts: 0 });
            assert!(agent.attempted().is_empty());
        }
        assert_eq!(report.rounds, 0);
    }

    fn committed(name: &str, direction: &str, round: u64) -> AgentReport {
        AgentReport {
            name: name.into(),
            outcome: NegotiationOutcome::Committed { direction: direction.into(), attempt: 0, round },
            trace: Vec::new(),
        }
    }

    #[test]
    fn test_commits_to_one_direction_in_different_rounds_violate_exclusivity() {
        let report = LivelockReport {
            agents: vec![committed("Alice", "left", 1), committed("Barbara", "left", 3)],
            rounds: 3,
            counters: Vec::new(),
        };
        assert_eq!(report.exclusivity_violations(), vec![Direction::from("left")]);

        let disjoint = LivelockReport {
            agents: vec![committed("Alice", "left", 1), committed("Barbara", "right", 1)],
            rounds: 1,
            counters: Vec::new(),
        };
        assert!(disjoint.exclusivity_violations().is_empty());
    }

    #[test]
    fn test_symmetry_follows_offsets_modulo_directions() {
        let config = LivelockConfig::default();
        assert!(config.is_symmetric());

        let wrapped = config.clone().with_agents(vec![
            AgentSpec::new("Alice"),
            AgentSpec::new("Barbara").with_preference_offset(2),
        ]);
        assert!(wrapped.is_symmetric());

        let offset = config.clone().with_agents(vec![
            AgentSpec::new("Alice"),
            AgentSpec::new("Barbara").with_preference_offset(1),
        ]);
        assert!(!offset.is_symmetric());

        let alone = config.with_agents(vec![AgentSpec::new("Alice")]);
        assert!(!alone.is_symmetric());
    }

    #[tokio::test]
    async fn test_huge_preference_offset_wraps() {
        let ctx = TokioContext::shared();
        let config = lockstep(AttemptBound::Limited(1))
            .with_agents(vec![AgentSpec::new("Alice").with_preference_offset(usize::MAX)]);
        let report = Hallway::new(ctx, config).unwrap().run().await.unwrap();

        // usize::MAX is odd: two directions, so Alice starts at "right".
        assert_eq!(
            report.agents[0].outcome,
            NegotiationOutcome::Committed { direction: "right".into(), attempt: 0, round: 1 }
        );
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let ctx = TokioContext::shared();
        let hallway = Hallway::new(ctx, lockstep(AttemptBound::Limited(1))).unwrap();
        hallway.run().await.unwrap();
        let rounds = hallway.rounds();

        let err = hallway.run().await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
        assert_eq!(hallway.rounds(), rounds);
        assert!(hallway.counters().iter().all(|c| c.count == 0));
    }

    #[tokio::test]
    async fn test_empty_config_is_rejected() {
        let ctx = TokioContext::shared();
        let no_dirs = LivelockConfig::default().with_directions(Vec::<Direction>::new());
        assert!(matches!(
            Hallway::new(ctx.clone(), no_dirs),
            Err(HarnessError::InvalidConfig(_))
        ));
        let no_agents = LivelockConfig::default().with_agents(vec![]);
        assert!(matches!(
            Hallway::new(ctx, no_agents),
            Err(HarnessError::InvalidConfig(_))
        ));
    }
}
