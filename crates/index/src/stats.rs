//! Pool statistics for Braid.
//!
//! This module provides usage tracking shared by `Pool` and `NodeArena`.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Usage statistics for an object pool.
#[derive(Debug)]
pub struct PoolStats {
    /// Number of instances ever manufactured by the factory.
    created: AtomicUsize,
    /// Number of instances currently handed out.
    in_use: AtomicUsize,
    /// Highest value `in_use` has reached.
    high_water: AtomicUsize,
}

impl PoolStats {
    /// Creates a new empty stats instance.
    pub fn new() -> Self {
        Self {
            created: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// Returns the number of instances ever created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns the number of instances currently in use.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Returns the high-water mark of concurrently used instances.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Records that an instance was handed out.
    pub fn record_get(&self, manufactured: bool) {
        if manufactured {
            self.created.fetch_add(1, Ordering::Relaxed);
        }
        let now = self.in_use.fetch_add(1, Ordering::Relaxed) + 1;
        self.high_water.fetch_max(now, Ordering::Relaxed);
    }

    /// Records that an instance was returned.
    pub fn record_free(&self) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records that `count` instances were returned at once.
    pub fn record_free_many(&self, count: usize) {
        self.in_use.fetch_sub(count, Ordering::Relaxed);
    }

    /// Forgets every created instance; the high-water mark is preserved.
    pub fn reset_created(&self) {
        self.created.store(0, Ordering::Relaxed);
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PoolStats {
    fn clone(&self) -> Self {
        Self {
            created: AtomicUsize::new(self.created()),
            in_use: AtomicUsize::new(self.in_use()),
            high_water: AtomicUsize::new(self.high_water()),
        }
    }
}
