//! Node arena with a free list.
//!
//! Nodes are addressed by `NodeId` handles rather than references, so a
//! recycled node can never leave a dangling alias behind. A node is owned
//! by exactly one party at a time: either a live container (through the
//! handle returned by `alloc`) or the arena's free list (after `release`).
//! Released nodes keep their slot, so node identity is reused for the
//! arena's whole lifetime.

use crate::stats::PoolStats;
use alloc::vec::Vec;

/// Handle to a node slot inside a `NodeArena`.
pub type NodeId = usize;

/// A doubly linked node.
///
/// `key` and `value` are `None` while the node sits on the free list.
#[derive(Debug)]
pub struct Node<K, V> {
    pub(crate) key: Option<K>,
    pub(crate) value: Option<V>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

impl<K, V> Node<K, V> {
    #[inline]
    fn empty() -> Self {
        Self {
            key: None,
            value: None,
            prev: None,
            next: None,
        }
    }

    /// Returns the node key, or `None` if the node is free.
    #[inline]
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Returns the node value, or `None` if the node is free.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Returns the previous node in the owning list.
    #[inline]
    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    /// Returns the next node in the owning list.
    #[inline]
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Returns true if the node is on the free list.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.key.is_none()
    }
}

/// Slot storage for `Node`s with a stack of free slots.
#[derive(Debug)]
pub struct NodeArena<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<NodeId>,
    stats: PoolStats,
}

impl<K, V> Default for NodeArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeArena<K, V> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            stats: PoolStats::new(),
        }
    }

    /// Creates an arena able to hold `capacity` nodes without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            stats: PoolStats::new(),
        }
    }

    /// Takes a node off the free list (or appends a new slot) and fills it.
    ///
    /// The returned node is unlinked.
    pub fn alloc(&mut self, key: K, value: V) -> NodeId {
        let id = match self.free.pop() {
            Some(id) => {
                self.stats.record_get(false);
                id
            }
            None => {
                self.stats.record_get(true);
                self.nodes.push(Node::empty());
                self.nodes.len() - 1
            }
        };
        let node = &mut self.nodes[id];
        node.key = Some(key);
        node.value = Some(value);
        id
    }

    /// Moves a node back onto the free list and returns its contents.
    ///
    /// Key, value and links are reset before the slot becomes reusable.
    /// Returns `None` if the node is already free.
    pub fn release(&mut self, id: NodeId) -> Option<(K, V)> {
        let node = self.nodes.get_mut(id)?;
        let key = node.key.take()?;
        let value = node.value.take();
        node.prev = None;
        node.next = None;
        self.free.push(id);
        self.stats.record_free();
        value.map(|value| (key, value))
    }

    /// Returns the node behind a handle.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node<K, V>> {
        self.nodes.get(id)
    }

    /// Returns the node behind a handle mutably.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(id)
    }

    /// Returns the number of nodes currently owned by a container.
    #[inline]
    pub fn live(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Returns the number of slots ever created.
    #[inline]
    pub fn slots(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of nodes waiting on the free list.
    #[inline]
    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    /// Releases the slot storage once no node is live.
    ///
    /// Returns false (and does nothing) while nodes are still in use.
    pub fn drain(&mut self) -> bool {
        if self.live() != 0 {
            return false;
        }
        self.nodes.clear();
        self.nodes.shrink_to_fit();
        self.free.clear();
        self.free.shrink_to_fit();
        self.stats.reset_created();
        true
    }

    /// Returns the usage statistics.
    #[inline]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}
