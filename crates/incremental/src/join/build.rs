//! Build-mode join store.
//!
//! Left items are rebuilt from right state. The store tracks which left
//! items hang off each link key; when a right batch touches a link key,
//! every left item in that bucket is marked affected. Marks collapse per
//! left key, and the whole batch is flushed as one Update notification to
//! the store's subscribers.

use super::buckets::Buckets;
use super::{JoinConfig, JoinItem, JoinKey, JoinMode, JoinStore, RightObserver, RightSink};
use crate::mutex::JoinMutex;
use braid_core::{Action, Error, KeyValue, Notification, Result};
use braid_index::OrderedKeyedList;
use braid_reactive::{Channel, Observable, Observer, Subscription};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

struct BuildState<K, L, R, LK> {
    /// link -> right item
    rights: HashMap<LK, R>,
    /// link -> {left key -> left item}
    lefts: Buckets<K, L, LK>,
    /// Left items touched by the batch being processed
    affected: OrderedKeyedList<K, L>,
}

impl<K, L, R, LK> BuildState<K, L, R, LK>
where
    K: JoinKey,
    L: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    fn new() -> Self {
        Self {
            rights: HashMap::new(),
            lefts: Buckets::new(),
            affected: OrderedKeyedList::new(),
        }
    }

    fn apply(&mut self, config: &JoinConfig<L, R, LK>, notification: &Notification<R>) {
        if notification.action == Action::Reload {
            // Every left item that had a right counterpart must be rebuilt,
            // whether or not the same right item comes back in this batch.
            let stale: Vec<LK> = self.rights.drain().map(|(link, _)| link).collect();
            for link in &stale {
                self.mark(link);
            }
            for right in notification.new_items.iter().filter(|r| config.accepts(r)) {
                self.upsert(config, right);
            }
            return;
        }

        for right in &notification.old_items {
            self.remove(&config.right_link(right));
        }
        for right in &notification.new_items {
            if config.accepts(right) {
                self.upsert(config, right);
            } else {
                self.remove(&config.right_link(right));
            }
        }
    }

    fn upsert(&mut self, config: &JoinConfig<L, R, LK>, right: &R) {
        let link = config.right_link(right);
        self.rights.insert(link.clone(), right.clone());
        self.mark(&link);
    }

    fn remove(&mut self, link: &LK) {
        if self.rights.remove(link).is_some() {
            self.mark(link);
        }
    }

    fn mark(&mut self, link: &LK) {
        if let Some(bucket) = self.lefts.bucket(link) {
            for (key, left) in bucket {
                self.affected.set(key.clone(), left.clone());
            }
        }
    }

    fn clear(&mut self) {
        self.rights.clear();
        self.lefts.clear();
        self.affected.clear();
        self.lefts.drain_pool();
        self.affected.drain_pool();
    }
}

// ============================================================================
// Store
// ============================================================================

struct BuildInner<K, L, R, LK> {
    config: JoinConfig<L, R, LK>,
    mutex: Arc<JoinMutex>,
    state: Mutex<BuildState<K, L, R, LK>>,
    updates: Channel<Notification<KeyValue<K, L>>>,
    disposed: AtomicBool,
}

impl<K, L, R, LK> RightSink<R> for BuildInner<K, L, R, LK>
where
    K: JoinKey,
    L: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    fn on_right(&self, notification: &Notification<R>) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        self.mutex.ordered(
            || {
                let mut state = self.state.lock();
                state.apply(&self.config, notification);
                state.affected.flush()
            },
            |batch| {
                tracing::trace!(
                    source = self.config.name(),
                    action = ?notification.action,
                    rights = notification.len(),
                    affected = batch.len(),
                    "build join processed right batch"
                );
                if !batch.is_empty() {
                    self.updates.send(&Notification::update(batch));
                }
            },
        );
    }

    fn source_name(&self) -> &str {
        self.config.name()
    }
}

/// Join store that marks left items for rebuilding when their right item
/// changes.
///
/// # Example
///
/// ```rust
/// use braid_core::Notification;
/// use braid_incremental::{BuildJoinStore, JoinConfig, JoinMutex, JoinStore};
/// use braid_reactive::Channel;
/// use std::sync::Arc;
///
/// let customers: Channel<Notification<(u32, &'static str)>> = Channel::new();
/// let config = JoinConfig::new(
///     "customers",
///     |order: &(u32, u32)| order.1,
///     |c: &(u32, &'static str)| c.0,
/// );
/// let store = BuildJoinStore::new(config, &customers, Arc::new(JoinMutex::new()));
///
/// store.left_added(&1u32, &(1, 7), &());
/// customers.send(&Notification::add(vec![(7, "Ada")]));
///
/// let right = store.get_right(&(1, 7)).unwrap();
/// assert_eq!(right, Some((7, "Ada")));
/// ```
///
/// `V` is the repository's built value. The store never reads it; it only
/// fixes the `JoinStore` surface the store implements.
pub struct BuildJoinStore<K, L, V, R, LK> {
    inner: Arc<BuildInner<K, L, R, LK>>,
    source: Mutex<Option<Subscription>>,
    _value: PhantomData<fn(&V)>,
}

impl<K, L, V, R, LK> BuildJoinStore<K, L, V, R, LK>
where
    K: JoinKey,
    L: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    /// Creates a store and subscribes it to `source`.
    pub fn new<S>(config: JoinConfig<L, R, LK>, source: &S, mutex: Arc<JoinMutex>) -> Self
    where
        S: Observable<Notification<R>> + ?Sized,
    {
        let inner = Arc::new(BuildInner {
            config,
            mutex,
            state: Mutex::new(BuildState::new()),
            updates: Channel::new(),
            disposed: AtomicBool::new(false),
        });
        let subscription = source.subscribe(Arc::new(RightObserver::new(&inner)));
        tracing::debug!(source = inner.config.name(), mode = "build", "join store attached");

        Self {
            inner,
            source: Mutex::new(Some(subscription)),
            _value: PhantomData,
        }
    }

    /// Returns the right source name.
    pub fn name(&self) -> &str {
        self.inner.config.name()
    }

    /// Number of link keys with at least one left item.
    pub fn link_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().lefts.link_count()
    }

    /// Number of tracked left items.
    pub fn left_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().lefts.len()
    }

    /// Number of known right items.
    pub fn right_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().rights.len()
    }

    /// Number of buckets waiting in the pool.
    pub fn pooled_buckets(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().lefts.pooled()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(Error::disposed(self.inner.config.name()));
        }
        Ok(())
    }
}

impl<K, L, V, R, LK> JoinStore<K, L, V> for BuildJoinStore<K, L, V, R, LK>
where
    K: JoinKey,
    L: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    type Right = R;

    fn mode(&self) -> JoinMode {
        JoinMode::Build
    }

    fn get_right(&self, left: &L) -> Result<Option<R>> {
        self.ensure_live()?;
        let link = self.inner.config.left_link(left);
        let _input = self.inner.mutex.input();
        let state = self.inner.state.lock();
        Ok(state.rights.get(&link).cloned())
    }

    fn left_added(&self, key: &K, left: &L, _value: &V) {
        if self.ensure_live().is_err() {
            return;
        }
        let link = self.inner.config.left_link(left);
        let _input = self.inner.mutex.input();
        let mut state = self.inner.state.lock();
        if state.lefts.attach(key.clone(), link, left.clone()).is_some() {
            tracing::trace!(
                source = self.inner.config.name(),
                "left item moved to a new link key"
            );
        }
    }

    fn left_removed(&self, key: &K, _left: &L, _value: &V) {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().lefts.detach(key);
    }

    fn left_cleared(&self) {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().lefts.clear();
    }

    fn subscribe(
        &self,
        observer: Arc<dyn Observer<Notification<KeyValue<K, L>>>>,
    ) -> Result<Subscription> {
        self.ensure_live()?;
        Ok(self.inner.updates.subscribe(observer))
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscription) = self.source.lock().take() {
            subscription.unsubscribe();
        }
        {
            let _input = self.inner.mutex.input();
            self.inner.state.lock().clear();
        }
        self.inner.updates.completed();
        tracing::debug!(source = self.inner.config.name(), mode = "build", "join store disposed");
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<K, L, V, R, LK> fmt::Debug for BuildJoinStore<K, L, V, R, LK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildJoinStore")
            .field("source", &self.inner.config.name())
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}
