//! Join stores.
//!
//! A join store keeps the association between a repository's left items
//! and a right source's items, and reacts to right-side notifications:
//!
//! - `BuildJoinStore` marks left items whose right counterpart changed and
//!   emits their keys so the repository can rebuild them
//! - `UpdateJoinStore` patches existing left values in place through an
//!   updater and forwards the touched values to the repository's stream
//! - `ManyJoinStore` keeps one ordered list of right items per link key and
//!   mirrors it into every attached target list
//!
//! All three share the repository's `JoinMutex` and expose the same
//! `JoinStore` surface; operations a mode does not support return
//! `Error::Unsupported`.

mod buckets;
mod build;
mod config;
mod many;
mod shared;
mod update;

pub use build::BuildJoinStore;
pub use config::{FilterFn, JoinConfig, KeyFn};
pub use many::{ListGetter, ManyJoinStore};
pub use shared::SharedList;
pub use update::{UpdateJoinStore, Updater};

use braid_core::{Error, KeyValue, Notification, Result};
use braid_reactive::{Observer, Subscription};
use core::hash::Hash;
use std::fmt;
use std::sync::{Arc, Weak};

/// Bound alias for keys held by join stores.
pub trait JoinKey: Eq + Hash + Clone + Send + Sync + 'static {}

impl<T> JoinKey for T where T: Eq + Hash + Clone + Send + Sync + 'static {}

/// Bound alias for items held by join stores.
pub trait JoinItem: Clone + Send + Sync + 'static {}

impl<T> JoinItem for T where T: Clone + Send + Sync + 'static {}

/// The three join strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinMode {
    /// Rebuild affected left values
    Build,
    /// Patch existing left values in place
    Update,
    /// Maintain per-left lists of right items
    Many,
}

impl JoinMode {
    /// Returns the lowercase mode name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Build => "build",
            JoinMode::Update => "update",
            JoinMode::Many => "many",
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of every join store.
///
/// `K` is the left item key, `L` the left item and `V` the value the
/// repository builds from it.
pub trait JoinStore<K, L, V>: Send + Sync {
    /// Right item type.
    type Right;

    /// Returns this store's mode.
    fn mode(&self) -> JoinMode;

    /// Returns the right item currently linked to `left`.
    fn get_right(&self, _left: &L) -> Result<Option<Self::Right>> {
        Err(Error::unsupported("get_right", self.mode().as_str()))
    }

    /// Records a left item and its built value.
    fn left_added(&self, key: &K, left: &L, value: &V);

    /// Forgets a left item.
    fn left_removed(&self, key: &K, left: &L, value: &V);

    /// Forgets every left item.
    fn left_cleared(&self);

    /// Subscribes to the keys of left items that need rebuilding.
    fn subscribe(
        &self,
        _observer: Arc<dyn Observer<Notification<KeyValue<K, L>>>>,
    ) -> Result<Subscription> {
        Err(Error::unsupported("subscribe", self.mode().as_str()))
    }

    /// Detaches from the right source and releases all state.
    fn dispose(&self);

    /// Returns true once `dispose` has run.
    fn is_disposed(&self) -> bool;
}

/// Internal sink receiving right-source notifications.
pub(crate) trait RightSink<R>: Send + Sync {
    fn on_right(&self, notification: &Notification<R>);

    fn source_name(&self) -> &str;
}

/// Observer attached to a right source on behalf of a store.
///
/// Holds the store weakly so a dropped store is not kept alive by its
/// source.
pub(crate) struct RightObserver<I> {
    sink: Weak<I>,
}

impl<I> RightObserver<I> {
    pub(crate) fn new(sink: &Arc<I>) -> Self {
        Self {
            sink: Arc::downgrade(sink),
        }
    }
}

impl<I, R> Observer<Notification<R>> for RightObserver<I>
where
    I: RightSink<R> + 'static,
{
    fn on_next(&self, notification: &Notification<R>) -> Result<()> {
        if let Some(sink) = self.sink.upgrade() {
            sink.on_right(notification);
        }
        Ok(())
    }

    fn on_error(&self, error: &Error) {
        if let Some(sink) = self.sink.upgrade() {
            tracing::warn!(
                source = sink.source_name(),
                error = %error,
                "right source failed, join state may be stale"
            );
        }
    }

    fn on_completed(&self) -> Result<()> {
        if let Some(sink) = self.sink.upgrade() {
            tracing::debug!(source = sink.source_name(), "right source completed");
        }
        Ok(())
    }
}
