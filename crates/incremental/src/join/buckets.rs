//! Link-key buckets with a reverse index.
//!
//! Forward index `link -> {key -> item}` plus reverse index `key -> link`.
//! Both are kept mutually consistent: moving a key to a new link removes it
//! from the old bucket first, and a bucket that becomes empty goes straight
//! back to the pool. Buckets keep insertion order, so batches built from
//! them are deterministic.

use braid_index::{OrderedKeyedList, Pool};
use core::hash::Hash;
use hashbrown::HashMap;

pub(crate) struct Buckets<K, X, LK> {
    forward: HashMap<LK, OrderedKeyedList<K, X>>,
    reverse: HashMap<K, LK>,
    pool: Pool<OrderedKeyedList<K, X>>,
}

impl<K, X, LK> Buckets<K, X, LK>
where
    K: Eq + Hash + Clone + 'static,
    X: 'static,
    LK: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            pool: Pool::new(OrderedKeyedList::new),
        }
    }

    /// Associates `key` with `link`, moving it out of its previous bucket.
    ///
    /// Returns the link the key was moved away from, if it changed.
    pub(crate) fn attach(&mut self, key: K, link: LK, item: X) -> Option<LK> {
        let moved_from = match self.reverse.get(&key) {
            Some(previous) if *previous != link => {
                let previous = previous.clone();
                self.remove_from_bucket(&key, &previous);
                Some(previous)
            }
            _ => None,
        };

        self.reverse.insert(key.clone(), link.clone());
        let bucket = match self.forward.entry(link) {
            hashbrown::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hashbrown::hash_map::Entry::Vacant(entry) => entry.insert(self.pool.get()),
        };
        bucket.set(key, item);
        moved_from
    }

    /// Forgets `key`, returning its link and item.
    pub(crate) fn detach(&mut self, key: &K) -> Option<(LK, X)> {
        let link = self.reverse.remove(key)?;
        let item = self.remove_from_bucket(key, &link)?;
        Some((link, item))
    }

    /// Forgets every key; all buckets return to the pool.
    pub(crate) fn clear(&mut self) {
        self.reverse.clear();
        for (_, bucket) in self.forward.drain() {
            self.pool.free(bucket);
        }
    }

    #[inline]
    pub(crate) fn bucket(&self, link: &LK) -> Option<&OrderedKeyedList<K, X>> {
        self.forward.get(link)
    }

    /// Number of non-empty buckets.
    #[inline]
    pub(crate) fn link_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of associated keys.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.reverse.len()
    }

    #[inline]
    pub(crate) fn pooled(&self) -> usize {
        self.pool.pooled()
    }

    pub(crate) fn drain_pool(&mut self) {
        self.pool.drain();
    }

    fn remove_from_bucket(&mut self, key: &K, link: &LK) -> Option<X> {
        let bucket = self.forward.get_mut(link)?;
        let item = bucket.remove(key);
        if bucket.is_empty() {
            if let Some(bucket) = self.forward.remove(link) {
                self.pool.free(bucket);
            }
        }
        item
    }
}
