//! Ordered keyed list: a hash index over an intrusive doubly linked list.
//!
//! `OrderedKeyedList` gives O(1) keyed insert, update, delete and lookup
//! while iterating in insertion order. An update never moves a node. The
//! list doubles as a "dedup + flush" staging buffer: callers record items
//! under their identity and later `flush()` the whole batch at once.
//!
//! # Example
//!
//! ```rust
//! use braid_index::OrderedKeyedList;
//!
//! let mut list = OrderedKeyedList::new();
//! list.set("b", 1);
//! list.set("a", 2);
//! list.set("b", 3); // update keeps position
//!
//! let keys: Vec<_> = list.keys().copied().collect();
//! assert_eq!(keys, vec!["b", "a"]);
//!
//! let batch = list.flush();
//! assert_eq!(batch.len(), 2);
//! assert!(list.is_empty());
//! ```

use crate::arena::{NodeArena, NodeId};
use crate::pool::Recycle;
use crate::stats::PoolStats;
use alloc::vec::Vec;
use braid_core::KeyValue;
use core::fmt;
use core::hash::Hash;
use hashbrown::HashMap;

/// An insertion-ordered map with O(1) keyed operations.
pub struct OrderedKeyedList<K, V> {
    /// Key -> node handle
    index: HashMap<K, NodeId>,
    /// Node storage, recycled through its free list
    arena: NodeArena<K, V>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl<K, V> Default for OrderedKeyedList<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OrderedKeyedList<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            arena: NodeArena::new(),
            head: None,
            tail: None,
        }
    }

    /// Creates an empty list with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            arena: NodeArena::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    /// Returns the number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns true if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.arena.get(id)?.value.as_ref()
    }

    /// Returns the value stored under `key` mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let id = *self.index.get(key)?;
        self.arena.get_mut(id)?.value.as_mut()
    }

    /// Inserts or updates `key`.
    ///
    /// A new key is appended at the tail; an existing key keeps its
    /// position and the previous value is returned.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&id) = self.index.get(&key) {
            if let Some(node) = self.arena.get_mut(id) {
                return node.value.replace(value);
            }
        }

        let id = self.arena.alloc(key.clone(), value);
        self.link_back(id);
        self.index.insert(key, id);
        None
    }

    /// Removes `key`, recycling its node. Returns the removed value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.index.remove(key)?;
        self.unlink(id);
        self.arena.release(id).map(|(_, value)| value)
    }

    /// Detaches every entry in insertion order and recycles all nodes.
    pub fn flush(&mut self) -> Vec<KeyValue<K, V>> {
        let mut out = Vec::with_capacity(self.len());
        self.drain_each(|key, value| out.push(KeyValue::new(key, value)));
        out
    }

    /// Like `flush`, but returns only the values.
    pub fn flush_values(&mut self) -> Vec<V> {
        let mut out = Vec::with_capacity(self.len());
        self.drain_each(|_, value| out.push(value));
        out
    }

    /// Recycles every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.drain_each(|_, _| {});
    }

    /// Recycles every entry, invoking `on_each` with each removed pair in
    /// insertion order.
    #[inline]
    pub fn clear_with<F>(&mut self, on_each: F)
    where
        F: FnMut(K, V),
    {
        self.drain_each(on_each);
    }

    /// Copies every entry in insertion order without draining.
    pub fn snapshot(&self) -> Vec<KeyValue<K, V>>
    where
        V: Clone,
    {
        self.iter()
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
            .collect()
    }

    /// Copies every value in insertion order without draining.
    pub fn snapshot_values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.values().cloned().collect()
    }

    /// Returns the zero-based position of `key` in insertion order.
    ///
    /// This walks the list and is O(n).
    pub fn position(&self, key: &K) -> Option<usize> {
        let target = *self.index.get(key)?;
        let mut cursor = self.head;
        let mut position = 0;
        while let Some(id) = cursor {
            if id == target {
                return Some(position);
            }
            position += 1;
            cursor = self.arena.get(id).and_then(|node| node.next);
        }
        None
    }

    /// Returns the first entry.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.entry_at(self.head?)
    }

    /// Returns the last entry.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entry_at(self.tail?)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            arena: &self.arena,
            cursor: self.head,
            remaining: self.len(),
        }
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Counts the nodes reachable from head to tail.
    ///
    /// Always equal to `len()`; exposed for consistency checks.
    pub fn walk_len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            count += 1;
            cursor = self.arena.get(id).and_then(|node| node.next);
        }
        count
    }

    /// Returns the node arena statistics.
    #[inline]
    pub fn node_stats(&self) -> &PoolStats {
        self.arena.stats()
    }

    /// Returns the number of recycled nodes waiting for reuse.
    #[inline]
    pub fn pooled_nodes(&self) -> usize {
        self.arena.pooled()
    }

    /// Clears the list and releases all pooled node storage.
    pub fn drain_pool(&mut self) {
        self.clear();
        self.index.shrink_to_fit();
        self.arena.drain();
    }

    fn entry_at(&self, id: NodeId) -> Option<(&K, &V)> {
        let node = self.arena.get(id)?;
        Some((node.key.as_ref()?, node.value.as_ref()?))
    }

    fn drain_each<F>(&mut self, mut f: F)
    where
        F: FnMut(K, V),
    {
        let mut cursor = self.head.take();
        self.tail = None;
        self.index.clear();
        while let Some(id) = cursor {
            cursor = self.arena.get(id).and_then(|node| node.next);
            if let Some((key, value)) = self.arena.release(id) {
                f(key, value);
            }
        }
    }

    fn link_back(&mut self, id: NodeId) {
        let tail = self.tail;
        if let Some(node) = self.arena.get_mut(id) {
            node.prev = tail;
            node.next = None;
        }
        match tail.and_then(|t| self.arena.get_mut(t)) {
            Some(tail_node) => tail_node.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn unlink(&mut self, id: NodeId) {
        let (prev, next) = match self.arena.get_mut(id) {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };
        match prev.and_then(|p| self.arena.get_mut(p)) {
            Some(prev_node) => prev_node.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.arena.get_mut(n)) {
            Some(next_node) => next_node.prev = prev,
            None => self.tail = prev,
        }
    }
}

impl<K, V> Recycle for OrderedKeyedList<K, V>
where
    K: Eq + Hash + Clone,
{
    #[inline]
    fn recycle(&mut self) {
        self.clear();
    }
}

impl<K, V> fmt::Debug for OrderedKeyedList<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a OrderedKeyedList<K, V>
where
    K: Eq + Hash + Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Insertion-order iterator over an `OrderedKeyedList`.
pub struct Iter<'a, K, V> {
    arena: &'a NodeArena<K, V>,
    cursor: Option<NodeId>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.arena.get(id)?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((node.key.as_ref()?, node.value.as_ref()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
