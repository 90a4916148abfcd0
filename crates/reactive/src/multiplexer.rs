//! Multi-source merge.
//!
//! A `Multiplexer<T>` is a `Channel<T>` plus a registry of the upstream
//! sources feeding it. Each upstream can be attached and detached on its
//! own without terminating the downstream channel. An upstream that
//! completes or fails is detached; the downstream keeps running.
//!
//! The producer form takes a `Dispatcher`: every emission is handed to it
//! as a "run this" callback, so the caller decides on which execution
//! context delivery happens.
//!
//! # Example
//!
//! ```rust
//! use braid_core::Notification;
//! use braid_reactive::{Channel, FnObserver, Multiplexer, Observable};
//! use std::sync::{Arc, Mutex};
//!
//! let orders: Channel<Notification<u32>> = Channel::new();
//! let archive: Channel<Notification<u32>> = Channel::new();
//!
//! let merged = Multiplexer::new();
//! let orders_id = merged.add(&orders);
//! merged.add(&archive);
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let _sub = merged.subscribe(
//!     FnObserver::infallible(move |n: &Notification<u32>| {
//!         sink.lock().unwrap().extend(n.items().iter().copied())
//!     })
//!     .into_arc(),
//! );
//!
//! orders.send(&Notification::add(vec![1]));
//! archive.send(&Notification::add(vec![2]));
//! merged.remove(orders_id);
//! orders.send(&Notification::add(vec![3]));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! ```

use crate::channel::{Channel, WeakChannel};
use crate::observer::{Observable, Observer};
use crate::subscription::Subscription;
use braid_core::{Action, Error, Notification, Result};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identifier of an upstream source attached to a multiplexer.
pub type SourceId = u64;

/// A deferred emission handed to a `Dispatcher`.
pub type Job = Box<dyn FnOnce() + Send>;

/// Runs emissions on a caller-chosen execution context.
pub type Dispatcher = Arc<dyn Fn(Job) + Send + Sync>;

/// Turns one upstream value into emissions on the multiplexer.
type Forward<I, T> = Box<dyn Fn(&MuxInner<T>, &I) + Send + Sync>;

struct MuxInner<T> {
    channel: Channel<T>,
    upstreams: Mutex<HashMap<SourceId, Subscription>>,
    next_id: AtomicU64,
    dispatcher: Option<Dispatcher>,
}

impl<T> MuxInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn emit(&self, value: &T) {
        match &self.dispatcher {
            Some(dispatch) => {
                let channel = self.channel.clone();
                let value = value.clone();
                dispatch(Box::new(move || channel.send(&value)));
            }
            None => self.channel.send(value),
        }
    }

    fn detach(&self, id: SourceId) -> bool {
        let removed = self.upstreams.lock().remove(&id);
        match removed {
            Some(subscription) => {
                subscription.unsubscribe();
                tracing::debug!(source = id, "upstream detached");
                true
            }
            None => false,
        }
    }
}

/// Forwards one upstream into the multiplexer.
struct Upstream<I, T> {
    id: SourceId,
    mux: Weak<MuxInner<T>>,
    forward: Forward<I, T>,
}

impl<I, T> Observer<I> for Upstream<I, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_next(&self, value: &I) -> Result<()> {
        if let Some(mux) = self.mux.upgrade() {
            (self.forward)(&mux, value);
        }
        Ok(())
    }

    fn on_error(&self, error: &Error) {
        tracing::warn!(source = self.id, error = %error, "upstream failed, detaching");
        if let Some(mux) = self.mux.upgrade() {
            mux.detach(self.id);
        }
    }

    fn on_completed(&self) -> Result<()> {
        if let Some(mux) = self.mux.upgrade() {
            mux.detach(self.id);
        }
        Ok(())
    }
}

/// Merges any number of upstream streams of one item type.
pub struct Multiplexer<T> {
    inner: Arc<MuxInner<T>>,
}

impl<T> Clone for Multiplexer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Multiplexer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Multiplexer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a multiplexer that emits synchronously.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a producer whose emissions all run through `dispatcher`.
    pub fn with_dispatcher<F>(dispatcher: F) -> Self
    where
        F: Fn(Job) + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(dispatcher)))
    }

    fn build(dispatcher: Option<Dispatcher>) -> Self {
        Self {
            inner: Arc::new(MuxInner {
                channel: Channel::new(),
                upstreams: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                dispatcher,
            }),
        }
    }

    /// Attaches an upstream source. Returns the id used to detach it.
    pub fn add<S>(&self, source: &S) -> SourceId
    where
        S: Observable<T> + ?Sized,
    {
        self.attach(source, Box::new(|mux: &MuxInner<T>, value: &T| mux.emit(value)))
    }

    fn attach<I, S>(&self, source: &S, forward: Forward<I, T>) -> SourceId
    where
        I: 'static,
        S: Observable<I> + ?Sized,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let upstream = Upstream {
            id,
            mux: Arc::downgrade(&self.inner),
            forward,
        };
        let subscription = source.subscribe(Arc::new(upstream));
        // A source that was already completed hands back an inactive subscription.
        if subscription.is_active() {
            self.inner.upstreams.lock().insert(id, subscription);
            tracing::debug!(source = id, "upstream attached");
        }
        id
    }

    /// Detaches an upstream source. Returns false if it was not attached.
    pub fn remove(&self, id: SourceId) -> bool {
        self.inner.detach(id)
    }

    /// Detaches every upstream source.
    pub fn remove_all(&self) {
        let drained: Vec<Subscription> =
            self.inner.upstreams.lock().drain().map(|(_, s)| s).collect();
        for subscription in drained {
            subscription.unsubscribe();
        }
    }

    /// Returns true if `id` is currently attached.
    pub fn contains(&self, id: SourceId) -> bool {
        self.inner.upstreams.lock().contains_key(&id)
    }

    /// Returns the number of attached upstream sources.
    pub fn upstream_count(&self) -> usize {
        self.inner.upstreams.lock().len()
    }

    /// Emits a value directly, through the dispatcher if one is set.
    pub fn send(&self, value: &T) {
        self.inner.emit(value);
    }

    /// Returns the downstream channel.
    pub fn channel(&self) -> &Channel<T> {
        &self.inner.channel
    }

    /// Returns a weak handle to the downstream channel.
    pub fn downgrade_channel(&self) -> WeakChannel<T> {
        self.inner.channel.downgrade()
    }
}

impl<T> Multiplexer<Notification<T>>
where
    T: Clone + Send + Sync + 'static,
{
    /// Attaches an upstream of plain items. Each item is emitted as a
    /// single-item notification tagged with `action`.
    pub fn add_with<S>(&self, action: Action, source: &S) -> SourceId
    where
        S: Observable<T> + ?Sized,
    {
        self.attach(
            source,
            Box::new(move |mux: &MuxInner<Notification<T>>, item: &T| {
                mux.emit(&Notification::with_action(action, vec![item.clone()]))
            }),
        )
    }

    /// Attaches an upstream of notifications, re-tagging every batch with
    /// `action`.
    pub fn add_retagged<S>(&self, action: Action, source: &S) -> SourceId
    where
        S: Observable<Notification<T>> + ?Sized,
    {
        self.attach(
            source,
            Box::new(move |mux: &MuxInner<Notification<T>>, n: &Notification<T>| {
                mux.emit(&n.clone().retag(action))
            }),
        )
    }
}

impl<T> Observable<T> for Multiplexer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        self.inner.channel.subscribe(observer)
    }
}

impl<T> fmt::Debug for Multiplexer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiplexer")
            .field("channel", &self.inner.channel)
            .field("upstreams", &self.inner.upstreams.lock().len())
            .field("dispatched", &self.inner.dispatcher.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::FnObserver;

    fn collect<T: Clone + Send + 'static>(
        observable: &impl Observable<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let sub = observable
            .subscribe(FnObserver::infallible(move |v: &T| sink.lock().push(v.clone())).into_arc());
        (log, sub)
    }

    #[test]
    fn test_multiplexer_merges_sources() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<i32> = Channel::new();
        let mux = Multiplexer::new();
        mux.add(&a);
        mux.add(&b);

        let (log, _sub) = collect(&mux);
        a.send(&1);
        b.send(&2);
        a.send(&3);

        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(mux.upstream_count(), 2);
    }

    #[test]
    fn test_multiplexer_remove_one_source() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<i32> = Channel::new();
        let mux = Multiplexer::new();
        let id_a = mux.add(&a);
        mux.add(&b);

        let (log, _sub) = collect(&mux);
        assert!(mux.remove(id_a));
        assert!(!mux.remove(id_a));
        a.send(&1);
        b.send(&2);

        assert_eq!(*log.lock(), vec![2]);
        assert_eq!(a.subscriber_count(), 0);
        assert!(!mux.contains(id_a));
    }

    #[test]
    fn test_multiplexer_upstream_completion_detaches_only_that_source() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<i32> = Channel::new();
        let mux = Multiplexer::new();
        let id_a = mux.add(&a);
        let id_b = mux.add(&b);

        let (log, _sub) = collect(&mux);
        a.completed();
        b.send(&5);

        assert!(!mux.contains(id_a));
        assert!(mux.contains(id_b));
        assert!(!mux.channel().is_completed());
        assert_eq!(*log.lock(), vec![5]);
    }

    #[test]
    fn test_multiplexer_upstream_error_detaches() {
        let a: Channel<i32> = Channel::new();
        let mux = Multiplexer::new();
        let id = mux.add(&a);

        a.error(&Error::subscriber("source lost"));
        assert!(!mux.contains(id));
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn test_multiplexer_add_completed_source() {
        let a: Channel<i32> = Channel::new();
        a.completed();
        let mux = Multiplexer::new();
        let id = mux.add(&a);
        assert!(!mux.contains(id));
    }

    #[test]
    fn test_multiplexer_remove_all() {
        let a: Channel<i32> = Channel::new();
        let b: Channel<i32> = Channel::new();
        let mux = Multiplexer::new();
        mux.add(&a);
        mux.add(&b);

        mux.remove_all();
        assert_eq!(mux.upstream_count(), 0);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn test_multiplexer_dispatcher_wraps_every_emission() {
        let queue: Arc<Mutex<Vec<Job>>> = Arc::new(Mutex::new(Vec::new()));
        let q = queue.clone();
        let mux = Multiplexer::with_dispatcher(move |job| q.lock().push(job));

        let a: Channel<i32> = Channel::new();
        mux.add(&a);
        let (log, _sub) = collect(&mux);

        a.send(&1);
        mux.send(&2);
        assert!(log.lock().is_empty());
        assert_eq!(queue.lock().len(), 2);

        let jobs: Vec<Job> = queue.lock().drain(..).collect();
        for job in jobs {
            job();
        }
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn test_multiplexer_add_with_action() {
        let rows: Channel<u32> = Channel::new();
        let batches: Channel<Notification<u32>> = Channel::new();
        let mux = Multiplexer::new();
        mux.add_with(Action::Add, &rows);
        mux.add(&batches);

        let (log, _sub) = collect(&mux);
        rows.send(&7);
        batches.send(&Notification::remove(vec![3]));
        rows.send(&8);

        let received = log.lock();
        assert_eq!(received.len(), 3);
        assert_eq!(received[0].action, Action::Add);
        assert_eq!(received[0].new_items, vec![7]);
        assert_eq!(received[1].action, Action::Remove);
        assert_eq!(received[2].new_items, vec![8]);
    }

    #[test]
    fn test_multiplexer_add_retagged() {
        let source: Channel<Notification<u32>> = Channel::new();
        let mux = Multiplexer::new();
        mux.add_retagged(Action::Remove, &source);

        let (log, _sub) = collect(&mux);
        source.send(&Notification::add(vec![1, 2]));

        let received = log.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].action, Action::Remove);
        assert_eq!(received[0].old_items, vec![1, 2]);
    }

    #[test]
    fn test_multiplexer_chained() {
        let a: Channel<i32> = Channel::new();
        let inner = Multiplexer::new();
        inner.add(&a);
        let outer = Multiplexer::new();
        outer.add(&inner);

        let (log, _sub) = collect(&outer);
        a.send(&4);
        assert_eq!(*log.lock(), vec![4]);
    }
}
