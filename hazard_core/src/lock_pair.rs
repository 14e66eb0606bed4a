//! OrderedLockPair - two agents, two cells, and an acquisition order.
//!
//! With [`LockOrder::Opposed`] agent A takes `(cell1, cell2)` and agent B
//! takes `(cell2, cell1)`, each sleeping between its first and second
//! acquisition. Once both agents sit in that window each holds the cell the
//! other wants, and neither ever proceeds.
//!
//! The pair never times itself out. A caller that wants an answer wraps
//! [`OrderedLockPair::run`] in [`crate::await_with_limit`] and reads the
//! progress board afterwards.

use crate::cell::SharedCell;
use crate::error::HarnessError;
use crate::harness::AgentGroup;
use hazard_env::{AgentName, HazardContext};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// The order in which the two agents acquire the cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockOrder {
    /// A locks cell1 then cell2, B locks cell2 then cell1
    #[default]
    Opposed,

    /// Both agents lock cell1 then cell2
    Consistent,
}

/// Parameters of the lock-ordering scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockPairConfig {
    /// Work done between the first and second acquisition
    pub delay: Duration,

    /// Acquisition order of the two agents
    pub order: LockOrder,

    /// Initial values of cell1 and cell2
    pub initial_values: (i64, i64),
}

impl Default for LockPairConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            order: LockOrder::Opposed,
            initial_values: (0, 0),
        }
    }
}

impl LockPairConfig {
    /// Sets the delay between acquisitions.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the acquisition order.
    pub fn with_order(mut self, order: LockOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the initial cell values.
    pub fn with_values(mut self, cell1: i64, cell2: i64) -> Self {
        self.initial_values = (cell1, cell2);
        self
    }
}

/// Where an agent is in its two-lock sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum AgentStage {
    /// Spawned, first lock not yet requested
    Starting,

    /// Waiting for its first cell
    Acquiring { wanted: String },

    /// Holding its first cell, doing the interposed work
    Holding { held: String },

    /// Holding its first cell, blocked on its second
    Waiting { held: String, wanted: String },

    /// Both cells acquired and released
    Done { sum: i64 },
}

/// Progress of one agent, as published on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProgress {
    pub agent: AgentName,
    pub stage: AgentStage,
}

/// Result of a pair run that finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCompletion {
    /// `cell1 + cell2` as read by A, then by B
    pub sums: Vec<i64>,
}

/// Shared board where agents publish their stage.
#[derive(Debug)]
struct ProgressBoard {
    entries: Mutex<Vec<AgentProgress>>,
}

impl ProgressBoard {
    fn new(agents: &[AgentName]) -> Self {
        Self {
            entries: Mutex::new(
                agents
                    .iter()
                    .map(|agent| AgentProgress {
                        agent: agent.clone(),
                        stage: AgentStage::Starting,
                    })
                    .collect(),
            ),
        }
    }

    fn set(&self, slot: usize, stage: AgentStage) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(slot) {
            debug!("{} -> {:?}", entry.agent, stage);
            entry.stage = stage;
        }
    }

    fn snapshot(&self) -> Vec<AgentProgress> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Everything one agent needs, moved into its task.
struct LockPlan {
    slot: usize,
    first: Arc<SharedCell>,
    second: Arc<SharedCell>,
    delay: Duration,
}

/// Two agents locking two shared cells in a configurable order.
pub struct OrderedLockPair<C: HazardContext> {
    ctx: Arc<C>,
    config: LockPairConfig,
    agents: [AgentName; 2],
    cells: [Arc<SharedCell>; 2],
    board: Arc<ProgressBoard>,
}

impl<C: HazardContext> OrderedLockPair<C> {
    /// Creates the pair and its two cells.
    pub fn new(ctx: Arc<C>, config: LockPairConfig) -> Self {
        let agents = [AgentName::from("A"), AgentName::from("B")];
        let (v1, v2) = config.initial_values;
        let cells = [
            Arc::new(SharedCell::new("cell1", v1)),
            Arc::new(SharedCell::new("cell2", v2)),
        ];
        let board = Arc::new(ProgressBoard::new(&agents));
        Self {
            ctx,
            config,
            agents,
            cells,
            board,
        }
    }

    /// Returns the pair's configuration.
    pub fn config(&self) -> &LockPairConfig {
        &self.config
    }

    /// Returns the two contested cells.
    pub fn cells(&self) -> &[Arc<SharedCell>; 2] {
        &self.cells
    }

    /// Returns the latest published stage of each agent.
    pub fn progress(&self) -> Vec<AgentProgress> {
        self.board.snapshot()
    }

    /// Spawns both agents and waits for both to finish.
    ///
    /// With [`LockOrder::Opposed`] this does not return. Dropping the
    /// returned future aborts both agents, which releases their cells.
    pub async fn run(&self) -> Result<PairCompletion, HarnessError> {
        let [cell1, cell2] = &self.cells;
        let plans = match self.config.order {
            LockOrder::Opposed => [
                (Arc::clone(cell1), Arc::clone(cell2)),
                (Arc::clone(cell2), Arc::clone(cell1)),
            ],
            LockOrder::Consistent => [
                (Arc::clone(cell1), Arc::clone(cell2)),
                (Arc::clone(cell1), Arc::clone(cell2)),
            ],
        };

        info!(
            "Lock pair starting: order={:?}, delay={:?}",
            self.config.order, self.config.delay
        );

        let mut group = AgentGroup::new();
        for (slot, (first, second)) in plans.into_iter().enumerate() {
            let plan = LockPlan {
                slot,
                first,
                second,
                delay: self.config.delay,
            };
            let ctx = Arc::clone(&self.ctx);
            let board = Arc::clone(&self.board);
            let name = self.agents[slot].clone();
            let handle = self.ctx.spawn(name.as_str(), lock_in_order(ctx, board, plan));
            group.push(name, handle);
        }

        let sums = group.join_all().await?;
        info!("Lock pair completed: sums={:?}", sums);
        Ok(PairCompletion { sums })
    }
}

/// One agent: take the first cell, work, take the second, sum both.
async fn lock_in_order<C: HazardContext>(
    ctx: Arc<C>,
    board: Arc<ProgressBoard>,
    plan: LockPlan,
) -> i64 {
    let LockPlan {
        slot,
        first,
        second,
        delay,
    } = plan;

    board.set(slot, AgentStage::Acquiring { wanted: first.label().to_string() });
    let first_guard = first.lock().await;

    board.set(slot, AgentStage::Holding { held: first.label().to_string() });
    ctx.sleep(delay).await;

    board.set(
        slot,
        AgentStage::Waiting {
            held: first.label().to_string(),
            wanted: second.label().to_string(),
        },
    );
    let second_guard = second.lock().await;

    let sum = first_guard.get() + second_guard.get();
    drop(second_guard);
    drop(first_guard);

    board.set(slot, AgentStage::Done { sum });
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::await_with_limit;
    use hazard_env::TokioContext;

    #[tokio::test(start_paused = true)]
    async fn test_opposed_order_hangs_past_twice_the_delay() {
        let ctx = TokioContext::shared();
        let delay = Duration::from_millis(100);
        let pair = OrderedLockPair::new(ctx, LockPairConfig::default().with_delay(delay));

        let err = await_with_limit(delay * 2, pair.run()).await.unwrap_err();
        assert!(err.is_hang());

        let progress = pair.progress();
        assert_eq!(
            progress[0].stage,
            AgentStage::Waiting { held: "cell1".into(), wanted: "cell2".into() }
        );
        assert_eq!(
            progress[1].stage,
            AgentStage::Waiting { held: "cell2".into(), wanted: "cell1".into() }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborting_a_deadlocked_pair_frees_cells() {
        let ctx = TokioContext::shared();
        let pair = OrderedLockPair::new(
            ctx,
            LockPairConfig::default().with_delay(Duration::from_millis(10)),
        );

        let _ = await_with_limit(Duration::from_millis(50), pair.run()).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        for cell in pair.cells() {
            assert!(!cell.is_locked(), "{} still held", cell.label());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_consistent_order_completes() {
        let ctx = TokioContext::shared();
        let pair = OrderedLockPair::new(
            ctx,
            LockPairConfig::default()
                .with_delay(Duration::from_millis(100))
                .with_order(LockOrder::Consistent)
                .with_values(2, 5),
        );

        let done = await_with_limit(Duration::from_secs(1), pair.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.sums, vec![7, 7]);
        assert!(pair
            .progress()
            .iter()
            .all(|p| p.stage == AgentStage::Done { sum: 7 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_opposed_is_still_a_window() {
        // Without any work between the two acquisitions the agents can
        // still interleave; the run either finishes or hangs, never errors.
        let ctx = TokioContext::shared();
        let pair = OrderedLockPair::new(ctx, LockPairConfig::default().with_delay(Duration::ZERO));

        match await_with_limit(Duration::from_millis(10), pair.run()).await {
            Ok(done) => assert_eq!(done.unwrap().sums.len(), 2),
            Err(err) => assert!(err.is_hang()),
        }
    }
}
