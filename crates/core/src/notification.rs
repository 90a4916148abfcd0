//! Notification batches exchanged at every producer/source boundary.
//!
//! A `Notification<T>` bundles a set of items with an `Action` telling the
//! receiver how to interpret them. Add and Update carry their payload in
//! `new_items`; Remove carries it in `old_items`; Reload means "discard all
//! previously known state, then treat `new_items` as a fresh Add batch".

use alloc::vec::Vec;

/// What a notification batch means to its receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Items were added.
    Add,
    /// Items already known to the receiver changed.
    Update,
    /// Items were removed.
    Remove,
    /// All previous state is stale; `new_items` is the complete new state.
    Reload,
}

impl Action {
    /// Returns true if the payload of this action lives in `new_items`.
    #[inline]
    pub fn carries_new_items(self) -> bool {
        !matches!(self, Action::Remove)
    }
}

/// A batch of changes tagged with an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification<T> {
    /// How the receiver must interpret the batch
    pub action: Action,
    /// Removed items (Remove only)
    pub old_items: Vec<T>,
    /// Added, updated or reloaded items
    pub new_items: Vec<T>,
}

impl<T> Notification<T> {
    /// Creates a notification from its raw parts.
    #[inline]
    pub fn new(action: Action, old_items: Vec<T>, new_items: Vec<T>) -> Self {
        Self {
            action,
            old_items,
            new_items,
        }
    }

    /// Creates an Add batch.
    #[inline]
    pub fn add(items: Vec<T>) -> Self {
        Self::new(Action::Add, Vec::new(), items)
    }

    /// Creates an Update batch.
    #[inline]
    pub fn update(items: Vec<T>) -> Self {
        Self::new(Action::Update, Vec::new(), items)
    }

    /// Creates a Remove batch.
    #[inline]
    pub fn remove(items: Vec<T>) -> Self {
        Self::new(Action::Remove, items, Vec::new())
    }

    /// Creates a Reload batch.
    #[inline]
    pub fn reload(items: Vec<T>) -> Self {
        Self::new(Action::Reload, Vec::new(), items)
    }

    /// Creates a notification carrying `items` for the given action.
    pub fn with_action(action: Action, items: Vec<T>) -> Self {
        if action.carries_new_items() {
            Self::new(action, Vec::new(), items)
        } else {
            Self::remove(items)
        }
    }

    /// Returns the payload of this batch according to its action.
    ///
    /// For Reload the payload is `new_items`; `old_items` is never consulted.
    #[inline]
    pub fn items(&self) -> &[T] {
        if self.action.carries_new_items() {
            &self.new_items
        } else {
            &self.old_items
        }
    }

    /// Consumes the notification and returns its payload.
    pub fn into_items(self) -> Vec<T> {
        if self.action.carries_new_items() {
            self.new_items
        } else {
            self.old_items
        }
    }

    /// Returns the number of items in the payload.
    #[inline]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns true if the payload is empty.
    ///
    /// An empty Reload is still meaningful: it clears the receiver.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Maps every item to a new type, keeping the action.
    pub fn map<U, F>(self, mut f: F) -> Notification<U>
    where
        F: FnMut(T) -> U,
    {
        Notification {
            action: self.action,
            old_items: self.old_items.into_iter().map(&mut f).collect(),
            new_items: self.new_items.into_iter().map(&mut f).collect(),
        }
    }

    /// Re-tags this batch with a different action, moving the payload to
    /// the side that action expects.
    pub fn retag(self, action: Action) -> Self {
        if self.action == action {
            return self;
        }
        Self::with_action(action, self.into_items())
    }
}

/// An immutable key/value pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyValue<K, V> {
    key: K,
    value: V,
}

impl<K, V> KeyValue<K, V> {
    /// Creates a new pair.
    #[inline]
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    /// Returns the key.
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value.
    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Splits the pair.
    #[inline]
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }

    /// Consumes the pair and returns the value.
    #[inline]
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<K, V> From<(K, V)> for KeyValue<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}
