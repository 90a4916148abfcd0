//! Generic object-recycling pool.
//!
//! A `Pool<T>` keeps a stack of free instances. `get()` pops one (or builds
//! a new one with the pool's factory) and `free(x)` moves `x` back after
//! resetting it through `Recycle`. Since `free` takes the instance by value
//! the caller cannot touch it afterwards.

use crate::stats::PoolStats;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::hash::{BuildHasher, Hash};

/// Types that can be reset to an empty state before being reused.
pub trait Recycle {
    /// Resets `self` so it is indistinguishable from a fresh instance.
    fn recycle(&mut self);
}

impl<T> Recycle for Vec<T> {
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<K, V, S> Recycle for hashbrown::HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<T, S> Recycle for hashbrown::HashSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<T: Recycle> Recycle for Box<T> {
    #[inline]
    fn recycle(&mut self) {
        (**self).recycle();
    }
}

/// Factory used by a pool to manufacture new instances.
pub type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// An object pool that eliminates allocation churn for reusable instances.
pub struct Pool<T> {
    /// Free instances, most recently freed on top
    free: Vec<T>,
    /// Builds a new instance when the free stack is empty
    factory: Factory<T>,
    /// Usage statistics
    stats: PoolStats,
}

impl<T: Recycle + Default + 'static> Default for Pool<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T: Recycle> Pool<T> {
    /// Creates a new pool using `factory` to build instances on demand.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            free: Vec::new(),
            factory: Box::new(factory),
            stats: PoolStats::new(),
        }
    }

    /// Creates a pool pre-warmed with `capacity` free instances.
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let mut pool = Self::new(factory);
        pool.free.reserve(capacity);
        for _ in 0..capacity {
            let item = (pool.factory)();
            pool.free.push(item);
        }
        pool
    }

    /// Takes an instance out of the pool, building one if none is free.
    pub fn get(&mut self) -> T {
        match self.free.pop() {
            Some(item) => {
                self.stats.record_get(false);
                item
            }
            None => {
                self.stats.record_get(true);
                (self.factory)()
            }
        }
    }

    /// Returns an instance to the pool.
    ///
    /// The instance is recycled before it becomes available again.
    pub fn free(&mut self, mut item: T) {
        item.recycle();
        self.stats.record_free();
        self.free.push(item);
    }

    /// Drops every pooled instance.
    ///
    /// Instances currently handed out are unaffected.
    pub fn drain(&mut self) {
        self.free.clear();
        self.free.shrink_to_fit();
    }

    /// Returns the number of free instances held by the pool.
    #[inline]
    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    /// Returns the usage statistics.
    #[inline]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl<T> core::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("pooled", &self.free.len())
            .field("stats", &self.stats)
            .finish()
    }
}
