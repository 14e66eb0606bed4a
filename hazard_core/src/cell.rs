//! SharedCell - a single contested integer behind an exclusive lock.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A mutually-exclusive container holding one integer value.
///
/// The lock is not reentrant: a holder that locks the same cell again
/// blocks forever. That is the property the lock-ordering scenario is
/// built on, so nothing here tries to prevent it.
#[derive(Debug)]
pub struct SharedCell {
    /// Label used in progress reports ("cell1", "cell2")
    label: String,

    /// The contested value
    value: Arc<Mutex<i64>>,
}

/// Exclusive access to a cell's value. Dropping it unlocks the cell.
#[derive(Debug)]
pub struct CellGuard {
    guard: OwnedMutexGuard<i64>,
}

impl SharedCell {
    /// Creates a cell holding `value`.
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value: Arc::new(Mutex::new(value)),
        }
    }

    /// Returns the cell's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Blocks until the cell is free and takes it.
    pub async fn lock(&self) -> CellGuard {
        CellGuard {
            guard: Arc::clone(&self.value).lock_owned().await,
        }
    }

    /// Takes the cell only if nobody holds it.
    pub fn try_lock(&self) -> Option<CellGuard> {
        Arc::clone(&self.value)
            .try_lock_owned()
            .ok()
            .map(|guard| CellGuard { guard })
    }

    /// Returns true if some agent currently holds the cell.
    pub fn is_locked(&self) -> bool {
        self.value.try_lock().is_err()
    }
}

impl CellGuard {
    /// Reads the value.
    pub fn get(&self) -> i64 {
        *self.guard
    }

    /// Writes the value.
    pub fn set(&mut self, value: i64) {
        *self.guard = value;
    }

    /// Releases the cell.
    pub fn unlock(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::await_with_limit;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_set_under_lock() {
        let cell = SharedCell::new("cell1", 3);
        let mut guard = cell.lock().await;
        assert_eq!(guard.get(), 3);
        guard.set(10);
        guard.unlock();

        assert!(!cell.is_locked());
        assert_eq!(cell.lock().await.get(), 10);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let cell = SharedCell::new("cell1", 0);
        let held = cell.lock().await;
        assert!(cell.is_locked());
        assert!(cell.try_lock().is_none());
        drop(held);
        assert!(cell.try_lock().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_relocking_same_cell_blocks_forever() {
        let cell = SharedCell::new("cell1", 0);
        let _first = cell.lock().await;

        let result = await_with_limit(Duration::from_secs(5), cell.lock()).await;
        assert!(result.unwrap_err().is_hang());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_serialized() {
        let cell = Arc::new(SharedCell::new("counter", 0));
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let mut guard = cell.lock().await;
                        let next = guard.get() + 1;
                        tokio::task::yield_now().await;
                        guard.set(next);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(cell.lock().await.get(), 1600);
    }
}
