//! Shared list handle mutated in place by Many-mode stores.

use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;

/// A cloneable handle to a list owned by a repository value.
///
/// Clones share the same underlying storage. A `ManyJoinStore` keeps every
/// attached handle parallel to its right-item list; readers take a snapshot
/// or a read guard.
pub struct SharedList<T> {
    inner: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for SharedList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for SharedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(items)),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Acquires a read guard over the items.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.read()
    }

    /// Returns true if both handles share the same storage.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn push(&self, item: T) {
        self.inner.write().push(item);
    }

    /// Replaces the item at `index`; out-of-range indices are ignored.
    pub(crate) fn set(&self, index: usize, item: T) {
        if let Some(slot) = self.inner.write().get_mut(index) {
            *slot = item;
        }
    }

    /// Removes the item at `index`; out-of-range indices are ignored.
    pub(crate) fn remove(&self, index: usize) {
        let mut items = self.inner.write();
        if index < items.len() {
            items.remove(index);
        }
    }

    pub(crate) fn replace(&self, items: Vec<T>) {
        *self.inner.write() = items;
    }

    pub(crate) fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<T: Clone> SharedList<T> {
    /// Copies the current items.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.read().clone()
    }

    /// Returns a copy of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.read().get(index).cloned()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.read().iter()).finish()
    }
}
