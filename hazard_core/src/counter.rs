//! DirectionCounter - how many agents currently claim an avoidance direction.

use hazard_env::Direction;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};

/// An atomically incremented/decremented claim counter for one direction.
///
/// One counter exists per direction per scenario instance; it is shared with
/// the agents explicitly and never reset. An agent that reads exactly `1`
/// after its own increment (and a cadence tick) holds an exclusive claim.
#[derive(Debug)]
pub struct DirectionCounter {
    /// The direction being claimed
    direction: Direction,

    /// Agents currently between claim and release
    count: AtomicI32,

    /// Highest value `count` ever reached
    peak: AtomicI32,

    /// Lowest value `count` ever reached
    floor: AtomicI32,
}

/// Point-in-time view of a counter, reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub direction: Direction,
    pub count: i32,
    pub peak: i32,
    pub floor: i32,
}

impl DirectionCounter {
    /// Creates a counter at zero.
    pub fn new(direction: impl Into<Direction>) -> Self {
        Self {
            direction: direction.into(),
            count: AtomicI32::new(0),
            peak: AtomicI32::new(0),
            floor: AtomicI32::new(0),
        }
    }

    /// Returns the direction this counter tracks.
    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    /// Registers a claim and returns the count including it.
    pub fn claim(&self) -> i32 {
        let now = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        now
    }

    /// Releases a claim and returns the count without it.
    pub fn release(&self) -> i32 {
        let now = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        self.floor.fetch_min(now, Ordering::SeqCst);
        now
    }

    /// Returns the current number of claimants.
    pub fn load(&self) -> i32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Returns true if exactly one agent currently claims the direction.
    pub fn is_exclusive(&self) -> bool {
        self.load() == 1
    }

    /// Captures the current, peak and floor values.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            direction: self.direction.clone(),
            count: self.load(),
            peak: self.peak.load(Ordering::SeqCst),
            floor: self.floor.load(Ordering::SeqCst),
        }
    }
}
