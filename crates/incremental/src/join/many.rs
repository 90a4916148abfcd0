//! Many-mode join store.
//!
//! Each link key gets a list manager holding the right items for that key
//! in insertion order, plus the target lists of every value currently
//! attached to the key. Right-side inserts, updates and removals are
//! replayed onto every target list at the same position, so each target
//! always equals the manager's right-item list.

use super::{
    JoinConfig, JoinItem, JoinKey, JoinMode, JoinStore, KeyFn, RightObserver, RightSink, SharedList,
};
use crate::mutex::JoinMutex;
use braid_core::{Action, Notification};
use braid_index::{OrderedKeyedList, Pool, Recycle};
use braid_reactive::{Observable, Subscription};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Resolves a value to the list the store keeps in sync.
pub type ListGetter<V, R> = Arc<dyn Fn(&V) -> SharedList<R> + Send + Sync>;

// ============================================================================
// List manager
// ============================================================================

struct ListManager<K, RK, R> {
    /// Right items for this link key, insertion ordered
    rights: OrderedKeyedList<RK, R>,
    /// Attached target lists by left key
    targets: HashMap<K, SharedList<R>>,
}

impl<K, RK, R> ListManager<K, RK, R>
where
    K: JoinKey,
    RK: JoinKey,
    R: JoinItem,
{
    fn new() -> Self {
        Self {
            rights: OrderedKeyedList::new(),
            targets: HashMap::new(),
        }
    }

    #[inline]
    fn is_idle(&self) -> bool {
        self.rights.is_empty() && self.targets.is_empty()
    }

    fn attach(&mut self, key: K, list: SharedList<R>) {
        list.replace(self.rights.snapshot_values());
        if let Some(previous) = self.targets.insert(key, list.clone()) {
            if !previous.ptr_eq(&list) {
                previous.clear();
            }
        }
    }

    fn detach(&mut self, key: &K) {
        if let Some(list) = self.targets.remove(key) {
            list.clear();
        }
    }

    fn detach_all(&mut self) {
        for (_, list) in self.targets.drain() {
            list.clear();
        }
    }

    fn upsert(&mut self, right_key: RK, right: &R) {
        match self.rights.position(&right_key) {
            Some(index) => {
                for list in self.targets.values() {
                    list.set(index, right.clone());
                }
            }
            None => {
                for list in self.targets.values() {
                    list.push(right.clone());
                }
            }
        }
        self.rights.set(right_key, right.clone());
    }

    fn remove(&mut self, right_key: &RK) {
        if let Some(index) = self.rights.position(right_key) {
            self.rights.remove(right_key);
            for list in self.targets.values() {
                list.remove(index);
            }
        }
    }

    fn reset_rights(&mut self) {
        self.rights.clear();
        for list in self.targets.values() {
            list.clear();
        }
    }
}

impl<K, RK, R> Recycle for ListManager<K, RK, R>
where
    K: JoinKey,
    RK: JoinKey,
    R: JoinItem,
{
    fn recycle(&mut self) {
        self.rights.recycle();
        self.targets.clear();
    }
}

// ============================================================================
// State
// ============================================================================

struct ManyState<K, R, RK, LK> {
    managers: HashMap<LK, ListManager<K, RK, R>>,
    /// Idle managers ready for another link key
    pool: Pool<ListManager<K, RK, R>>,
    /// right key -> link
    right_links: HashMap<RK, LK>,
    /// left key -> link
    left_links: HashMap<K, LK>,
}

impl<K, R, RK, LK> ManyState<K, R, RK, LK>
where
    K: JoinKey,
    R: JoinItem,
    RK: JoinKey,
    LK: JoinKey,
{
    fn new() -> Self {
        Self {
            managers: HashMap::new(),
            pool: Pool::new(ListManager::new),
            right_links: HashMap::new(),
            left_links: HashMap::new(),
        }
    }

    fn manager(&mut self, link: LK) -> &mut ListManager<K, RK, R> {
        match self.managers.entry(link) {
            hashbrown::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hashbrown::hash_map::Entry::Vacant(entry) => entry.insert(self.pool.get()),
        }
    }

    fn discard_if_idle(&mut self, link: &LK) {
        if self.managers.get(link).map_or(false, ListManager::is_idle) {
            if let Some(manager) = self.managers.remove(link) {
                self.pool.free(manager);
                tracing::trace!("list manager returned to pool");
            }
        }
    }

    fn discard_idle(&mut self) {
        let idle: Vec<LK> = self
            .managers
            .iter()
            .filter(|(_, manager)| manager.is_idle())
            .map(|(link, _)| link.clone())
            .collect();
        for link in idle {
            if let Some(manager) = self.managers.remove(&link) {
                self.pool.free(manager);
            }
        }
    }

    fn attach_left(&mut self, key: K, link: LK, list: SharedList<R>) {
        if let Some(previous) = self.left_links.insert(key.clone(), link.clone()) {
            if previous != link {
                if let Some(manager) = self.managers.get_mut(&previous) {
                    manager.detach(&key);
                }
                self.discard_if_idle(&previous);
            }
        }
        self.manager(link).attach(key, list);
    }

    fn detach_left(&mut self, key: &K) {
        if let Some(link) = self.left_links.remove(key) {
            if let Some(manager) = self.managers.get_mut(&link) {
                manager.detach(key);
            }
            self.discard_if_idle(&link);
        }
    }

    fn clear_lefts(&mut self) {
        self.left_links.clear();
        for manager in self.managers.values_mut() {
            manager.detach_all();
        }
        self.discard_idle();
    }

    fn upsert_right(&mut self, right_key: RK, link: LK, right: &R) {
        if let Some(previous) = self.right_links.get(&right_key) {
            if *previous != link {
                // Link changed: the item moves to the tail of the new group
                self.remove_right(&right_key);
            }
        }
        self.right_links.insert(right_key.clone(), link.clone());
        self.manager(link).upsert(right_key, right);
    }

    fn remove_right(&mut self, right_key: &RK) {
        if let Some(link) = self.right_links.remove(right_key) {
            if let Some(manager) = self.managers.get_mut(&link) {
                manager.remove(right_key);
            }
            self.discard_if_idle(&link);
        }
    }

    fn apply<L>(
        &mut self,
        config: &JoinConfig<L, R, LK>,
        right_key: &KeyFn<R, RK>,
        notification: &Notification<R>,
    ) {
        if notification.action == Action::Reload {
            self.right_links.clear();
            for manager in self.managers.values_mut() {
                manager.reset_rights();
            }
            self.discard_idle();
            for right in notification.new_items.iter().filter(|r| config.accepts(r)) {
                self.upsert_right(right_key(right), config.right_link(right), right);
            }
            return;
        }

        for right in &notification.old_items {
            self.remove_right(&right_key(right));
        }
        for right in &notification.new_items {
            if config.accepts(right) {
                self.upsert_right(right_key(right), config.right_link(right), right);
            } else {
                self.remove_right(&right_key(right));
            }
        }
    }

    fn clear(&mut self) {
        self.managers.clear();
        self.pool.drain();
        self.right_links.clear();
        self.left_links.clear();
    }
}

// ============================================================================
// Store
// ============================================================================

struct ManyInner<K, L, V, R, RK, LK> {
    config: JoinConfig<L, R, LK>,
    list_getter: ListGetter<V, R>,
    right_key: KeyFn<R, RK>,
    mutex: Arc<JoinMutex>,
    state: Mutex<ManyState<K, R, RK, LK>>,
    disposed: AtomicBool,
}

impl<K, L, V, R, RK, LK> RightSink<R> for ManyInner<K, L, V, R, RK, LK>
where
    K: JoinKey,
    L: Send + Sync + 'static,
    V: Send + Sync + 'static,
    R: JoinItem,
    RK: JoinKey,
    LK: JoinKey,
{
    fn on_right(&self, notification: &Notification<R>) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        let _input = self.mutex.input();
        let mut state = self.state.lock();
        state.apply(&self.config, &self.right_key, notification);
        tracing::trace!(
            source = self.config.name(),
            action = ?notification.action,
            rights = notification.len(),
            managers = state.managers.len(),
            "many join processed right batch"
        );
    }

    fn source_name(&self) -> &str {
        self.config.name()
    }
}

/// Join store that keeps a list of right items inside each value.
///
/// Right items are identified by their own right key so they can be updated
/// or removed individually. `get_right` and `subscribe` are unsupported:
/// lists are mutated in place and the store never emits.
pub struct ManyJoinStore<K, L, V, R, RK, LK> {
    inner: Arc<ManyInner<K, L, V, R, RK, LK>>,
    source: Mutex<Option<Subscription>>,
}

impl<K, L, V, R, RK, LK> ManyJoinStore<K, L, V, R, RK, LK>
where
    K: JoinKey,
    L: Send + Sync + 'static,
    V: Send + Sync + 'static,
    R: JoinItem,
    RK: JoinKey,
    LK: JoinKey,
{
    /// Creates a store and subscribes it to `source`.
    pub fn new<G, F, S>(
        config: JoinConfig<L, R, LK>,
        list_getter: G,
        right_key: F,
        source: &S,
        mutex: Arc<JoinMutex>,
    ) -> Self
    where
        G: Fn(&V) -> SharedList<R> + Send + Sync + 'static,
        F: Fn(&R) -> RK + Send + Sync + 'static,
        S: Observable<Notification<R>> + ?Sized,
    {
        let inner = Arc::new(ManyInner {
            config,
            list_getter: Arc::new(list_getter),
            right_key: Arc::new(right_key),
            mutex,
            state: Mutex::new(ManyState::new()),
            disposed: AtomicBool::new(false),
        });
        let subscription = source.subscribe(Arc::new(RightObserver::new(&inner)));
        tracing::debug!(source = inner.config.name(), mode = "many", "join store attached");

        Self {
            inner,
            source: Mutex::new(Some(subscription)),
        }
    }

    /// Returns the right source name.
    pub fn name(&self) -> &str {
        self.inner.config.name()
    }

    /// Number of live list managers.
    pub fn link_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().managers.len()
    }

    /// Number of idle list managers held for reuse.
    pub fn pooled_managers(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().pool.pooled()
    }

    /// Number of attached values.
    pub fn left_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().left_links.len()
    }

    /// Number of known right items.
    pub fn right_count(&self) -> usize {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().right_links.len()
    }
}

impl<K, L, V, R, RK, LK> JoinStore<K, L, V> for ManyJoinStore<K, L, V, R, RK, LK>
where
    K: JoinKey,
    L: Send + Sync + 'static,
    V: Send + Sync + 'static,
    R: JoinItem,
    RK: JoinKey,
    LK: JoinKey,
{
    type Right = R;

    fn mode(&self) -> JoinMode {
        JoinMode::Many
    }

    fn left_added(&self, key: &K, left: &L, value: &V) {
        if self.is_disposed() {
            return;
        }
        let link = self.inner.config.left_link(left);
        let list = (self.inner.list_getter)(value);
        let _input = self.inner.mutex.input();
        self.inner.state.lock().attach_left(key.clone(), link, list);
    }

    fn left_removed(&self, key: &K, _left: &L, _value: &V) {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().detach_left(key);
    }

    fn left_cleared(&self) {
        let _input = self.inner.mutex.input();
        self.inner.state.lock().clear_lefts();
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
        tracing::debug!(source = self.inner.config.name(), mode = "many", "join store disposed");
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<K, L, V, R, RK, LK> fmt::Debug for ManyJoinStore<K, L, V, R, RK, LK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyJoinStore")
            .field("source", &self.inner.config.name())
            .field("disposed", &self.inner.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_reactive::Channel;

    /// Right item: (right key, link, payload)
    type Right = (u32, u32, &'static str);

    /// Repository value: (id, link, embedded list)
    #[derive(Clone)]
    struct Value {
        id: u32,
        link: u32,
        items: SharedList<Right>,
    }

    type Store = ManyJoinStore<u32, Value, Value, Right, u32, u32>;

    fn store() -> (Channel<Notification<Right>>, Store) {
        let source = Channel::new();
        let config = JoinConfig::new("right", |l: &Value| l.link, |r: &Right| r.1);
        let store = ManyJoinStore::new(
            config,
            |v: &Value| v.items.clone(),
            |r: &Right| r.0,
            &source,
            Arc::new(JoinMutex::new()),
        );
        (source, store)
    }

    fn value(id: u32, link: u32) -> Value {
        Value {
            id,
            link,
            items: SharedList::new(),
        }
    }

    fn add(store: &Store, v: &Value) {
        store.left_added(&v.id, v, v);
    }

    fn payloads(v: &Value) -> Vec<&'static str> {
        v.items.to_vec().into_iter().map(|r| r.2).collect()
    }

    #[test]
    fn test_many_backfill_on_attach() {
        let (source, store) = store();
        source.send(&Notification::add(vec![(1, 7, "r1"), (2, 7, "r2"), (3, 8, "x")]));

        let v = value(1, 7);
        add(&store, &v);
        assert_eq!(payloads(&v), vec!["r1", "r2"]);
    }

    #[test]
    fn test_many_replays_onto_all_targets() {
        let (source, store) = store();
        let a = value(1, 7);
        let b = value(2, 7);
        add(&store, &a);
        add(&store, &b);

        source.send(&Notification::add(vec![(1, 7, "r1"), (2, 7, "r2")]));
        source.send(&Notification::update(vec![(1, 7, "r1'")]));

        assert_eq!(payloads(&a), vec!["r1'", "r2"]);
        assert_eq!(payloads(&b), vec!["r1'", "r2"]);
        assert_eq!(store.link_count(), 1);
    }

    #[test]
    fn test_many_link_change_moves_to_tail() {
        let (source, store) = store();
        let a = value(1, 7);
        let b = value(2, 8);
        add(&store, &a);
        add(&store, &b);
        source.send(&Notification::add(vec![(1, 7, "r1"), (2, 8, "r2")]));

        source.send(&Notification::update(vec![(1, 8, "r1")]));

        assert!(payloads(&a).is_empty());
        assert_eq!(payloads(&b), vec!["r2", "r1"]);
        assert_eq!(store.right_count(), 2);
    }

    #[test]
    fn test_many_left_removed_clears_list() {
        let (source, store) = store();
        let a = value(1, 7);
        add(&store, &a);
        source.send(&Notification::add(vec![(1, 7, "r1")]));

        store.left_removed(&1, &a, &a);
        assert!(a.items.is_empty());

        source.send(&Notification::add(vec![(2, 7, "r2")]));
        assert!(a.items.is_empty());
    }

    #[test]
    fn test_many_left_moves_between_links() {
        let (source, store) = store();
        source.send(&Notification::add(vec![(1, 7, "r1"), (2, 8, "r2")]));

        let a = value(1, 7);
        add(&store, &a);
        assert_eq!(payloads(&a), vec!["r1"]);

        let moved = Value { link: 8, ..a.clone() };
        add(&store, &moved);
        assert_eq!(payloads(&moved), vec!["r2"]);
        assert_eq!(store.left_count(), 1);
    }

    #[test]
    fn test_many_manager_discarded_when_idle() {
        let (source, store) = store();
        let a = value(1, 7);
        add(&store, &a);
        source.send(&Notification::add(vec![(1, 7, "r1")]));
        assert_eq!(store.link_count(), 1);

        source.send(&Notification::remove(vec![(1, 7, "r1")]));
        assert_eq!(store.link_count(), 1);

        store.left_removed(&1, &a, &a);
        assert_eq!(store.link_count(), 0);
        assert_eq!(store.pooled_managers(), 1);
    }

    #[test]
    fn test_many_manager_reused_from_pool() {
        let (source, store) = store();
        let a = value(1, 7);
        add(&store, &a);
        store.left_removed(&1, &a, &a);
        assert_eq!(store.pooled_managers(), 1);

        // A different link key picks up the recycled manager
        let b = value(2, 9);
        add(&store, &b);
        assert_eq!(store.pooled_managers(), 0);
        assert_eq!(store.link_count(), 1);
        assert_eq!(store.inner.state.lock().pool.stats().created(), 1);

        // Recycled managers start empty
        source.send(&Notification::add(vec![(1, 9, "r1")]));
        assert_eq!(payloads(&b), vec!["r1"]);
        assert!(a.items.is_empty());
    }

    #[test]
    fn test_many_left_cleared_keeps_rights() {
        let (source, store) = store();
        let a = value(1, 7);
        let b = value(2, 8);
        add(&store, &a);
        add(&store, &b);
        source.send(&Notification::add(vec![(1, 7, "r1")]));
        assert_eq!(store.link_count(), 2);

        store.left_cleared();
        assert!(a.items.is_empty());
        assert_eq!(store.left_count(), 0);
        // Link 7 still holds a right item, link 8 went idle
        assert_eq!(store.link_count(), 1);
        assert_eq!(store.pooled_managers(), 1);
        assert_eq!(store.right_count(), 1);

        add(&store, &a);
        assert_eq!(payloads(&a), vec!["r1"]);

        source.send(&Notification::add(vec![(2, 7, "r2")]));
        assert_eq!(payloads(&a), vec!["r1", "r2"]);
    }

    #[test]
    fn test_many_reload_replaces_lists() {
        let (source, store) = store();
        let a = value(1, 7);
        add(&store, &a);
        source.send(&Notification::add(vec![(1, 7, "r1"), (2, 7, "r2")]));

        source.send(&Notification::reload(vec![(3, 7, "r3")]));
        assert_eq!(payloads(&a), vec!["r3"]);
        assert_eq!(store.right_count(), 1);
    }

    #[test]
    fn test_many_filter_removes_item() {
        let source: Channel<Notification<Right>> = Channel::new();
        let config = JoinConfig::new("right", |l: &Value| l.link, |r: &Right| r.1)
            .with_filter(|r: &Right| r.2 != "hidden");
        let store = ManyJoinStore::new(
            config,
            |v: &Value| v.items.clone(),
            |r: &Right| r.0,
            &source,
            Arc::new(JoinMutex::new()),
        );
        let a = value(1, 7);
        add(&store, &a);

        source.send(&Notification::add(vec![(1, 7, "r1"), (2, 7, "r2")]));
        source.send(&Notification::update(vec![(1, 7, "hidden")]));
        assert_eq!(payloads(&a), vec!["r2"]);
    }

    #[test]
    fn test_many_unsupported_and_dispose() {
        let (source, store) = store();
        let err = JoinStore::get_right(&store, &value(1, 7)).unwrap_err();
        assert!(err.is_unsupported());

        add(&store, &value(1, 7));
        store.dispose();
        assert!(store.is_disposed());
        assert!(!source.has_subscribers());
        assert_eq!(store.link_count(), 0);
        assert_eq!(store.pooled_managers(), 0);
    }
}
