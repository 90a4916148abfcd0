//! Update-mode join store.
//!
//! Right items patch values the repository has already built. Each value
//! is associated with its link key; a right batch invokes the updater on
//! every value under the touched link keys and forwards the touched values,
//! deduplicated by repository key, straight into the repository's outgoing
//! stream. Values are expected to be shared handles the updater can mutate
//! through a shared reference.

use super::buckets::Buckets;
use super::{JoinConfig, JoinItem, JoinKey, JoinMode, JoinStore, RightObserver, RightSink};
use crate::mutex::JoinMutex;
use braid_core::{Action, KeyValue, Notification};
use braid_index::OrderedKeyedList;
use braid_reactive::{Channel, Observable, Subscription};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Patches a value from its right item; `None` means the right item is gone.
pub type Updater<V, R> = Arc<dyn Fn(&V, Option<&R>) + Send + Sync>;

struct UpdateState<K, V, R, LK> {
    rights: HashMap<LK, R>,
    values: Buckets<K, V, LK>,
    touched: OrderedKeyedList<K, V>,
}

impl<K, V, R, LK> UpdateState<K, V, R, LK>
where
    K: JoinKey,
    V: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    fn new() -> Self {
        Self {
            rights: HashMap::new(),
            values: Buckets::new(),
            touched: OrderedKeyedList::new(),
        }
    }

    fn apply<L>(
        &mut self,
        config: &JoinConfig<L, R, LK>,
        updater: &Updater<V, R>,
        notification: &Notification<R>,
    ) {
        if notification.action == Action::Reload {
            let stale: Vec<LK> = self.rights.drain().map(|(link, _)| link).collect();
            for right in notification.new_items.iter().filter(|r| config.accepts(r)) {
                self.upsert(config.right_link(right), right, updater);
            }
            // Links that did not come back lose their right item
            for link in &stale {
                if !self.rights.contains_key(link) {
                    self.patch(link, None, updater);
                }
            }
            return;
        }

        for right in &notification.old_items {
            self.remove(&config.right_link(right), updater);
        }
        for right in &notification.new_items {
            let link = config.right_link(right);
            if config.accepts(right) {
                self.upsert(link, right, updater);
            } else {
                self.remove(&link, updater);
            }
        }
    }

    fn upsert(&mut self, link: LK, right: &R, updater: &Updater<V, R>) {
        self.patch(&link, Some(right), updater);
        self.rights.insert(link, right.clone());
    }

    fn remove(&mut self, link: &LK, updater: &Updater<V, R>) {
        if self.rights.remove(link).is_some() {
            self.patch(link, None, updater);
        }
    }

    fn patch(&mut self, link: &LK, right: Option<&R>, updater: &Updater<V, R>) {
        if let Some(bucket) = self.values.bucket(link) {
            for (key, value) in bucket {
                updater(value, right);
                self.touched.set(key.clone(), value.clone());
            }
        }
    }

    fn clear(&mut self) {
        self.rights.clear();
        self.values.clear();
        self.touched.clear();
        self.values.drain_pool();
        self.touched.drain_pool();
    }
}

struct UpdateInner<K, L, V, R, LK> {
    config: JoinConfig<L, R, LK>,
    updater: Updater<V, R>,
    mutex: Arc<JoinMutex>,
    state: Mutex<UpdateState<K, V, R, LK>>,
    outgoing: Channel<Notification<KeyValue<K, V>>>,
    disposed: AtomicBool,
}

impl<K, L, V, R, LK> RightSink<R> for UpdateInner<K, L, V, R, LK>
where
    K: JoinKey,
    L: Send + Sync + 'static,
    V: JoinItem,
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
                state.apply(&self.config, &self.updater, notification);
                state.touched.flush()
            },
            |batch| {
                tracing::trace!(
                    source = self.config.name(),
                    action = ?notification.action,
                    rights = notification.len(),
                    touched = batch.len(),
                    "update join processed right batch"
                );
                if !batch.is_empty() {
                    self.outgoing.send(&Notification::update(batch));
                }
            },
        );
    }

    fn source_name(&self) -> &str {
        self.config.name()
    }
}

/// Join store that patches existing values in place.
///
/// `get_right` and `subscribe` are unsupported: touched values go to the
/// repository's own stream given at construction.
pub struct UpdateJoinStore<K, L, V, R, LK> {
    inner: Arc<UpdateInner<K, L, V, R, LK>>,
    source: Mutex<Option<Subscription>>,
}

impl<K, L, V, R, LK> UpdateJoinStore<K, L, V, R, LK>
where
    K: JoinKey,
    L: Send + Sync + 'static,
    V: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    /// Creates a store and subscribes it to `source`.
    ///
    /// Touched values are forwarded to `outgoing` as Update notifications.
    /// The updater runs while the store holds its state; it must not call
    /// back into this store.
    pub fn new<F, S>(
        config: JoinConfig<L, R, LK>,
        updater: F,
        outgoing: Channel<Notification<KeyValue<K, V>>>,
        source: &S,
        mutex: Arc<JoinMutex>,
    ) -> Self
    where
        F: Fn(&V, Option<&R>) + Send + Sync + 'static,
        S: Observable<Notification<R>> + ?Sized,
    {
        let inner = Arc::new(UpdateInner {
            config,
            updater: Arc::new(updater),
            mutex,
            state: Mutex::new(UpdateState::new()),
            outgoing,
            disposed: AtomicBool::new(false),
        });
        let subscription = source.subscribe(Arc::new(RightObserver::new(&inner)));
        tracing::debug!(source = inner.config.name(), mode = "update", "join store attached");

        Self {
            inner,
            source: Mutex::new(Some(subscription)),
        }
    }

    /// Returns the right source name.
    pub fn name(&self) -> &str {
        self.inner.config.name()
    }

    /// Number of link keys with at least one value.
    pub fn link_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().values.link_count()
    }

    /// Number of tracked values.
    pub fn left_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().values.len()
    }

    /// Number of known right items.
    pub fn right_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().rights.len()
    }
}

impl<K, L, V, R, LK> JoinStore<K, L, V> for UpdateJoinStore<K, L, V, R, LK>
where
    K: JoinKey,
    L: Send + Sync + 'static,
    V: JoinItem,
    R: JoinItem,
    LK: JoinKey,
{
    type Right = R;

    fn mode(&self) -> JoinMode {
        JoinMode::Update
    }

    fn left_added(&self, key: &K, left: &L, value: &V) {
        if self.is_disposed() {
            return;
        }
        let link = self.inner.config.left_link(left);
        let _input = self.inner.mutex.input();
        let mut state = self.inner.state.lock();
        if let Some(right) = state.rights.get(&link) {
            (self.inner.updater)(value, Some(right));
        }
        state.values.attach(key.clone(), link, value.clone());
    }

    fn left_removed(&self, key: &K, _left: &L, _value: &V) {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().values.detach(key);
    }

    fn left_cleared(&self) {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().values.clear();
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscription) = self.source.lock().take() {
            subscription.unsubscribe();
        }
        let _input = self.inner.mutex.input();
        self.inner.state.lock().clear();
        tracing::debug!(source = self.inner.config.name(), mode = "update", "join store disposed");
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<K, L, V, R, LK> fmt::Debug for UpdateJoinStore<K, L, V, R, LK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateJoinStore")
            .field("source", &self.inner.config.name())
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}
