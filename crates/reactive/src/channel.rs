//! Push-based fan-out channel.
//!
//! `Channel<T>` delivers values, errors and completion to every current
//! subscriber. The subscriber list is an immutable snapshot swapped
//! atomically: subscribe and unsubscribe build a new list under a short
//! exclusive section, while `send` captures the current snapshot and
//! iterates it without holding any lock. Observers added after the snapshot
//! was taken do not see that send.
//!
//! # Example
//!
//! ```rust
//! use braid_reactive::{Channel, FnObserver, Observable};
//! use std::sync::{Arc, Mutex};
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = received.clone();
//!
//! let channel = Channel::new();
//! let sub = channel.subscribe(
//!     FnObserver::infallible(move |v: &i32| sink.lock().unwrap().push(*v)).into_arc(),
//! );
//!
//! channel.send(&1);
//! sub.unsubscribe();
//! channel.send(&2);
//!
//! assert_eq!(*received.lock().unwrap(), vec![1]);
//! ```

use crate::observer::{Observable, Observer};
use crate::subscription::{Subscription, SubscriptionId};
use arc_swap::ArcSwap;
use braid_core::Error;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type FaultHandler = Box<dyn Fn(&Error) + Send + Sync>;

struct Entry<T> {
    id: SubscriptionId,
    observer: Arc<dyn Observer<T>>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            observer: self.observer.clone(),
        }
    }
}

struct ChannelInner<T> {
    /// Current subscriber snapshot
    subscribers: ArcSwap<Vec<Entry<T>>>,
    /// Serializes copy-on-write rebuilds of `subscribers`
    write: Mutex<()>,
    next_id: AtomicU64,
    completed: AtomicBool,
    /// The channel's own error path
    fault: Option<FaultHandler>,
}

impl<T> ChannelInner<T> {
    fn add(&self, observer: Arc<dyn Observer<T>>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _write = self.write.lock();
        let current = self.subscribers.load_full();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Entry { id, observer });
        self.subscribers.store(Arc::new(next));
        id
    }

    fn remove(&self, id: SubscriptionId) {
        let _write = self.write.lock();
        let current = self.subscribers.load_full();
        if !current.iter().any(|entry| entry.id == id) {
            return;
        }
        let next: Vec<Entry<T>> = current
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        self.subscribers.store(Arc::new(next));
    }

    fn clear(&self) {
        let _write = self.write.lock();
        self.subscribers.store(Arc::new(Vec::new()));
    }

    fn fault(&self, error: &Error) {
        match &self.fault {
            Some(handler) => handler(error),
            None => tracing::error!(error = %error, "unhandled channel fault"),
        }
    }
}

/// Clears the subscriber list when dropped, even if delivery unwinds.
struct ClearOnDrop<'a, T>(&'a ChannelInner<T>);

impl<T> Drop for ClearOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// A multicast subject.
///
/// Cloning a channel yields another handle to the same subscriber list.
pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Channel<T> {
    /// Creates a channel whose own faults are logged.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a channel that routes its own faults to `handler`.
    ///
    /// Faults raised while delivering completion end up here.
    pub fn with_fault_handler<F>(handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(handler)))
    }

    fn build(fault: Option<FaultHandler>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                subscribers: ArcSwap::from_pointee(Vec::new()),
                write: Mutex::new(()),
                next_id: AtomicU64::new(1),
                completed: AtomicBool::new(false),
                fault,
            }),
        }
    }

    /// Delivers `value` to every subscriber in the current snapshot.
    ///
    /// A subscriber that fails receives its own error through `on_error`;
    /// delivery continues with the remaining subscribers.
    pub fn send(&self, value: &T) {
        if self.is_completed() {
            tracing::trace!("send on completed channel dropped");
            return;
        }
        let snapshot = self.inner.subscribers.load_full();
        for entry in snapshot.iter() {
            if let Err(error) = entry.observer.on_next(value) {
                tracing::warn!(
                    subscription = entry.id,
                    error = %error,
                    "subscriber failed, routing error to its error path"
                );
                entry.observer.on_error(&error);
            }
        }
    }

    /// Delivers `error` to every subscriber in the current snapshot.
    pub fn error(&self, error: &Error) {
        if self.is_completed() {
            return;
        }
        let snapshot = self.inner.subscribers.load_full();
        for entry in snapshot.iter() {
            entry.observer.on_error(error);
        }
    }

    /// Completes the channel.
    ///
    /// Completion faults are routed to the channel's own error path. The
    /// subscriber list is cleared afterwards regardless of outcome. Later
    /// sends are dropped.
    pub fn completed(&self) {
        if self.inner.completed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _clear = ClearOnDrop(&self.inner);
        let snapshot = self.inner.subscribers.load_full();
        tracing::debug!(subscribers = snapshot.len(), "channel completed");
        for entry in snapshot.iter() {
            if let Err(error) = entry.observer.on_completed() {
                tracing::warn!(
                    subscription = entry.id,
                    error = %error,
                    "completion fault routed to channel error path"
                );
                self.inner.fault(&error);
            }
        }
    }

    /// Returns true once `completed` has been called.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Returns the number of subscribers in the current snapshot.
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }

    /// Returns true if nobody is subscribed.
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Returns a weak handle that does not keep the channel alive.
    pub fn downgrade(&self) -> WeakChannel<T> {
        WeakChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T: 'static> Observable<T> for Channel<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        if self.is_completed() {
            if let Err(error) = observer.on_completed() {
                self.inner.fault(&error);
            }
            return Subscription::empty();
        }
        let id = self.inner.add(observer);
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        })
    }
}

/// A channel is itself an observer, so it can be subscribed to another
/// stream to forward everything it receives.
impl<T: 'static> Observer<T> for Channel<T> {
    fn on_next(&self, value: &T) -> braid_core::Result<()> {
        self.send(value);
        Ok(())
    }

    fn on_error(&self, error: &Error) {
        self.error(error);
    }

    fn on_completed(&self) -> braid_core::Result<()> {
        self.completed();
        Ok(())
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.inner.subscribers.load().len())
            .field("completed", &self.inner.completed.load(Ordering::Relaxed))
            .finish()
    }
}

/// A non-owning channel handle.
pub struct WeakChannel<T> {
    inner: Weak<ChannelInner<T>>,
}

impl<T> Clone for WeakChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakChannel<T> {
    /// Returns the channel if it is still alive.
    pub fn upgrade(&self) -> Option<Channel<T>> {
        self.inner.upgrade().map(|inner| Channel { inner })
    }
}
