//! CadenceClock - the shared stepping signal of the negotiation scenario.
//!
//! Every agent waits on the clock before acting, which keeps all of them in
//! lock-step. A broadcast releases all current waiters at once; a waiter
//! registered before a broadcast is released by exactly that broadcast.
//!
//! Two drive modes exist:
//!
//! - **Periodic**: a ticker task broadcasts every `period`, the way a
//!   wall-clock metronome would.
//! - **Lockstep**: the broadcast fires as soon as every registered party is
//!   waiting. Rounds only advance once all agents block, so the
//!   interleaving is exact regardless of how the runtime schedules tasks.

use hazard_env::HazardContext;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::trace;

/// How the clock decides when to broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CadenceMode {
    /// Broadcast every `period` of runtime time
    Periodic(Duration),

    /// Broadcast once every participating agent is waiting
    Lockstep,
}

impl Default for CadenceMode {
    fn default() -> Self {
        CadenceMode::Periodic(Duration::from_millis(1))
    }
}

/// Round bookkeeping, guarded by one mutex so that registering a waiter and
/// broadcasting are totally ordered.
#[derive(Debug)]
struct Round {
    /// Number of broadcasts so far
    generation: u64,

    /// Parties currently blocked in `tick()`
    waiting: usize,

    /// Parties still participating (lockstep only)
    parties: usize,
}

#[derive(Debug)]
struct Shared {
    round: Mutex<Round>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Round> {
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the next round. Must be called with the round lock held.
    fn broadcast(&self, round: &mut Round) -> u64 {
        round.generation += 1;
        round.waiting = 0;
        self.notify.notify_waiters();
        trace!(generation = round.generation, "cadence broadcast");
        round.generation
    }
}

/// A shared, broadcast synchronization signal.
///
/// Created once per scenario run and shared by `Arc`. Dropping the last
/// handle stops the periodic ticker.
#[derive(Debug)]
pub struct CadenceClock {
    shared: Arc<Shared>,
    lockstep: bool,
    ticker: Option<JoinHandle<()>>,
}

impl CadenceClock {
    /// Creates a clock that broadcasts every `period` on the context's clock.
    pub fn periodic<C: HazardContext>(ctx: &Arc<C>, period: Duration) -> Self {
        let shared = Arc::new(Shared {
            round: Mutex::new(Round {
                generation: 0,
                waiting: 0,
                parties: 0,
            }),
            notify: Notify::new(),
        });

        let ticker_shared = Arc::clone(&shared);
        let ticker_ctx = Arc::clone(ctx);
        let ticker = ctx.spawn("cadence", async move {
            loop {
                ticker_ctx.sleep(period).await;
                {
                    let mut round = ticker_shared.lock();
                    ticker_shared.broadcast(&mut round);
                }
            }
        });

        Self {
            shared,
            lockstep: false,
            ticker: Some(ticker),
        }
    }

    /// Creates a clock that broadcasts when all `parties` are waiting.
    pub fn lockstep(parties: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                round: Mutex::new(Round {
                    generation: 0,
                    waiting: 0,
                    parties,
                }),
                notify: Notify::new(),
            }),
            lockstep: true,
            ticker: None,
        }
    }

    /// Creates a clock for `mode`; `parties` only matters in lockstep mode.
    pub fn with_mode<C: HazardContext>(ctx: &Arc<C>, mode: CadenceMode, parties: usize) -> Self {
        match mode {
            CadenceMode::Periodic(period) => Self::periodic(ctx, period),
            CadenceMode::Lockstep => Self::lockstep(parties),
        }
    }

    /// Blocks until the next broadcast and returns the round it opened.
    ///
    /// In lockstep mode the last party to arrive performs the broadcast
    /// itself and returns without waiting.
    pub async fn tick(&self) -> u64 {
        let (notified, target) = {
            let mut round = self.shared.lock();
            if self.lockstep {
                round.waiting += 1;
                if round.waiting >= round.parties {
                    return self.shared.broadcast(&mut round);
                }
            }
            // Registered under the round lock: the next broadcast cannot be missed.
            (self.shared.notify.notified(), round.generation + 1)
        };
        notified.await;
        target
    }

    /// Withdraws one party from a lockstep clock.
    ///
    /// Agents that finish early call this so the remaining agents are not
    /// held waiting for them. If everyone left is already waiting, the
    /// round is released. No-op for a periodic clock.
    pub fn leave(&self) {
        if !self.lockstep {
            return;
        }
        let mut round = self.shared.lock();
        round.parties = round.parties.saturating_sub(1);
        if round.waiting > 0 && round.waiting >= round.parties {
            self.shared.broadcast(&mut round);
        }
    }

    /// Returns the number of broadcasts so far.
    pub fn rounds(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Returns the parties still participating (lockstep only).
    pub fn parties(&self) -> usize {
        self.shared.lock().parties
    }

    /// Returns true if the clock advances only when every party waits.
    pub fn is_lockstep(&self) -> bool {
        self.lockstep
    }
}

impl Drop for CadenceClock {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_env::TokioContext;
    use proptest::prelude::*;

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tick_releases_once_per_round() {
        let ctx = TokioContext::shared();
        let clock = CadenceClock::periodic(&ctx, Duration::from_millis(1));

        let mut last = 0;
        for _ in 0..1000 {
            let round = clock.tick().await;
            assert_eq!(round, last + 1, "missed or duplicated release");
            last = round;
        }
        assert_eq!(clock.rounds(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_broadcast_wakes_all_waiters() {
        let ctx = TokioContext::shared();
        let clock = Arc::new(CadenceClock::periodic(&ctx, Duration::from_millis(5)));

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                tokio::spawn(async move { clock.tick().await })
            })
            .collect();

        let mut rounds = Vec::new();
        for waiter in waiters {
            rounds.push(waiter.await.unwrap());
        }
        assert!(rounds.iter().all(|r| *r == rounds[0]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lockstep_thousand_rounds_no_missed_release() {
        let parties = 3;
        let clock = Arc::new(CadenceClock::lockstep(parties));

        let agents: Vec<_> = (0..parties)
            .map(|_| {
                let clock = Arc::clone(&clock);
                tokio::spawn(async move {
                    let mut seen = Vec::with_capacity(1000);
                    for _ in 0..1000 {
                        seen.push(clock.tick().await);
                    }
                    seen
                })
            })
            .collect();

        let expected: Vec<u64> = (1..=1000).collect();
        for agent in agents {
            assert_eq!(agent.await.unwrap(), expected);
        }
        assert_eq!(clock.rounds(), 1000);
    }

    #[tokio::test]
    async fn test_lockstep_single_party_never_blocks() {
        let clock = CadenceClock::lockstep(1);
        assert_eq!(clock.tick().await, 1);
        assert_eq!(clock.tick().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_releases_remaining_waiter() {
        let clock = Arc::new(CadenceClock::lockstep(2));
        let waiter = {
            let clock = Arc::clone(&clock);
            tokio::spawn(async move { clock.tick().await })
        };

        // Let the waiter register before the other party leaves.
        tokio::time::sleep(Duration::from_millis(1)).await;
        clock.leave();

        assert_eq!(waiter.await.unwrap(), 1);
        assert_eq!(clock.parties(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_clock_stops_ticker() {
        let ctx = TokioContext::shared();
        let clock = CadenceClock::periodic(&ctx, Duration::from_millis(1));
        clock.tick().await;
        assert!(!clock.is_lockstep());

        let shared = Arc::clone(&clock.shared);
        drop(clock);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    proptest! {
        #[test]
        fn prop_lockstep_rounds_match_ticks(parties in 1usize..6, ticks in 1u64..50) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_time()
                .build()
                .unwrap();
            let rounds = rt.block_on(async move {
                let clock = Arc::new(CadenceClock::lockstep(parties));
                let handles: Vec<_> = (0..parties)
                    .map(|_| {
                        let clock = Arc::clone(&clock);
                        tokio::spawn(async move {
                            let mut last = 0;
                            for _ in 0..ticks {
                                last = clock.tick().await;
                            }
                            last
                        })
                    })
                    .collect();
                let mut finals = Vec::new();
                for handle in handles {
                    finals.push(handle.await.unwrap());
                }
                finals
            });
            prop_assert!(rounds.iter().all(|r| *r == ticks));
        }
    }
}
