//! Integration tests for the join stores.
//!
//! Run with: cargo test -p braid-incremental --test join_stores

use braid_core::{Action, KeyValue, Notification};
use braid_incremental::{
    BuildJoinStore, JoinConfig, JoinMutex, JoinStore, ManyJoinStore, SharedList, UpdateJoinStore,
};
use braid_reactive::{Channel, FnObserver, Multiplexer, Observable};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

// ============================================================================
// Fixtures
// ============================================================================

/// Left item: (id, link)
type Left = (u32, u32);
/// Right item: (right key, link, payload)
type Right = (u32, u32, &'static str);

type Batches = Arc<Mutex<Vec<Notification<KeyValue<u32, Left>>>>>;

fn build_store<S>(source: &S) -> (BuildJoinStore<u32, Left, (), Right, u32>, Batches)
where
    S: Observable<Notification<Right>> + ?Sized,
{
    let config = JoinConfig::new("right", |l: &Left| l.1, |r: &Right| r.1);
    let store: BuildJoinStore<u32, Left, (), Right, u32> =
        BuildJoinStore::new(config, source, Arc::new(JoinMutex::new()));

    let batches: Batches = Arc::new(Mutex::new(Vec::new()));
    let sink = batches.clone();
    store
        .subscribe(
            FnObserver::infallible(move |n: &Notification<KeyValue<u32, Left>>| {
                sink.lock().push(n.clone());
            })
            .into_arc(),
        )
        .unwrap()
        .forget();

    (store, batches)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn left_added(store: &BuildJoinStore<u32, Left, (), Right, u32>, left: Left) {
    store.left_added(&left.0, &left, &());
}

fn batch_keys(batch: &Notification<KeyValue<u32, Left>>) -> Vec<u32> {
    batch.new_items.iter().map(|kv| *kv.key()).collect()
}

// ============================================================================
// Build mode
// ============================================================================

#[test]
fn test_build_one_batch_per_right_batch() {
    let source: Channel<Notification<Right>> = Channel::new();
    let (store, batches) = build_store(&source);
    for id in 1..=5 {
        left_added(&store, (id, 7));
    }

    // Several right items touching the same link in one batch
    source.send(&Notification::add(vec![(1, 7, "a"), (2, 7, "b"), (3, 7, "c")]));

    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].action, Action::Update);
    assert_eq!(batch_keys(&batches[0]), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_build_link_change_leaves_old_bucket() {
    let source: Channel<Notification<Right>> = Channel::new();
    let (store, batches) = build_store(&source);

    left_added(&store, (1, 7));
    left_added(&store, (1, 8));
    assert_eq!(store.link_count(), 1);
    assert_eq!(store.left_count(), 1);

    source.send(&Notification::add(vec![(1, 7, "old")]));
    assert!(batches.lock().is_empty());

    source.send(&Notification::add(vec![(2, 8, "new")]));
    let batches = batches.lock();
    assert_eq!(batches.len(), 1);
    assert_eq!(batch_keys(&batches[0]), vec![1]);
}

#[test]
fn test_build_through_multiplexer() {
    init_tracing();
    let first: Channel<Notification<Right>> = Channel::new();
    let second: Channel<Notification<Right>> = Channel::new();
    let mux: Multiplexer<Notification<Right>> = Multiplexer::new();
    let first_id = mux.add(&first);
    mux.add(&second);

    let (store, batches) = build_store(&mux);
    left_added(&store, (1, 7));
    left_added(&store, (2, 8));

    first.send(&Notification::add(vec![(1, 7, "a")]));
    second.send(&Notification::add(vec![(2, 8, "b")]));
    assert_eq!(batches.lock().len(), 2);

    // Detaching one upstream keeps the other flowing
    assert!(mux.remove(first_id));
    first.send(&Notification::update(vec![(1, 7, "a'")]));
    second.send(&Notification::update(vec![(2, 8, "b'")]));

    let batches = batches.lock();
    assert_eq!(batches.len(), 3);
    assert_eq!(batch_keys(&batches[2]), vec![2]);
}

#[test]
fn test_build_subscriber_reenters_store() {
    let source: Channel<Notification<Right>> = Channel::new();
    let config = JoinConfig::new("right", |l: &Left| l.1, |r: &Right| r.1);
    let store: Arc<BuildJoinStore<u32, Left, (), Right, u32>> =
        Arc::new(BuildJoinStore::new(config, &source, Arc::new(JoinMutex::new())));

    // The repository rebuilds each affected item synchronously and
    // re-registers it; this must not deadlock.
    let weak = Arc::downgrade(&store);
    store
        .subscribe(
            FnObserver::infallible(move |n: &Notification<KeyValue<u32, Left>>| {
                if let Some(store) = weak.upgrade() {
                    for kv in &n.new_items {
                        assert!(store.get_right(kv.value()).unwrap().is_some());
                        store.left_added(kv.key(), kv.value(), &());
                    }
                }
            })
            .into_arc(),
        )
        .unwrap()
        .forget();

    left_added(&store, (1, 7));
    source.send(&Notification::add(vec![(1, 7, "a")]));
    assert_eq!(store.left_count(), 1);
}

#[test]
fn test_build_concurrent_producers() {
    init_tracing();
    let source: Channel<Notification<Right>> = Channel::new();
    let (store, batches) = build_store(&source);
    for id in 0..400 {
        left_added(&store, (id, id));
    }

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let source = source.clone();
            thread::spawn(move || {
                for i in 0..100u32 {
                    let link = t * 100 + i;
                    source.send(&Notification::add(vec![(link, link, "x")]));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let batches = batches.lock();
    assert_eq!(batches.len(), 400);
    let mut seen: Vec<u32> = batches.iter().flat_map(batch_keys).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..400).collect::<Vec<_>>());
    assert_eq!(store.right_count(), 400);
}

// ============================================================================
// Update mode
// ============================================================================

struct Row {
    id: u32,
    link: u32,
    patches: Mutex<Vec<Option<&'static str>>>,
}

#[test]
fn test_update_remove_patches_each_value_once() {
    let source: Channel<Notification<Right>> = Channel::new();
    let outgoing: Channel<Notification<KeyValue<u32, Arc<Row>>>> = Channel::new();

    let forwarded = Arc::new(Mutex::new(Vec::new()));
    let sink = forwarded.clone();
    outgoing
        .subscribe(
            FnObserver::infallible(move |n: &Notification<KeyValue<u32, Arc<Row>>>| {
                sink.lock().push((n.action, n.new_items.len()));
            })
            .into_arc(),
        )
        .forget();

    let config = JoinConfig::new("right", |l: &Arc<Row>| l.link, |r: &Right| r.1);
    let store = UpdateJoinStore::new(
        config,
        |row: &Arc<Row>, right: Option<&Right>| row.patches.lock().push(right.map(|r| r.2)),
        outgoing,
        &source,
        Arc::new(JoinMutex::new()),
    );

    let rows: Vec<Arc<Row>> = (1..=3)
        .map(|id| {
            Arc::new(Row {
                id,
                link: 7,
                patches: Mutex::new(Vec::new()),
            })
        })
        .collect();
    for row in &rows {
        store.left_added(&row.id, row, row);
    }

    source.send(&Notification::add(vec![(1, 7, "a")]));
    source.send(&Notification::remove(vec![(1, 7, "a")]));

    for row in &rows {
        assert_eq!(*row.patches.lock(), vec![Some("a"), None]);
    }
    assert_eq!(
        *forwarded.lock(),
        vec![(Action::Update, 3), (Action::Update, 3)]
    );
}

// ============================================================================
// Many mode
// ============================================================================

#[derive(Clone)]
struct Holder {
    id: u32,
    link: u32,
    items: SharedList<Right>,
}

type Many = ManyJoinStore<u32, Holder, Holder, Right, u32, u32>;

fn many_store(source: &Channel<Notification<Right>>) -> Many {
    let config = JoinConfig::new("right", |l: &Holder| l.link, |r: &Right| r.1);
    ManyJoinStore::new(
        config,
        |h: &Holder| h.items.clone(),
        |r: &Right| r.0,
        source,
        Arc::new(JoinMutex::new()),
    )
}

fn holder(id: u32, link: u32) -> Holder {
    Holder {
        id,
        link,
        items: SharedList::new(),
    }
}

fn payloads(h: &Holder) -> Vec<&'static str> {
    h.items.to_vec().into_iter().map(|r| r.2).collect()
}

#[test]
fn test_many_backfill_and_positional_remove() {
    let source: Channel<Notification<Right>> = Channel::new();
    let store = many_store(&source);
    source.send(&Notification::add(vec![(1, 7, "r1"), (2, 7, "r2"), (3, 7, "r3")]));

    let v = holder(1, 7);
    let w = holder(2, 7);
    assert!(v.items.is_empty());
    store.left_added(&v.id, &v, &v);
    store.left_added(&w.id, &w, &w);
    assert_eq!(payloads(&v), vec!["r1", "r2", "r3"]);

    source.send(&Notification::remove(vec![(2, 7, "r2")]));
    assert_eq!(payloads(&v), vec!["r1", "r3"]);
    assert_eq!(payloads(&w), vec!["r1", "r3"]);
}

#[derive(Clone, Debug)]
enum RightOp {
    Upsert(u32, u32),
    Remove(u32),
    Reload(Vec<(u32, u32)>),
}

fn right_op() -> impl Strategy<Value = RightOp> {
    prop_oneof![
        4 => (0u32..8, 0u32..3).prop_map(|(k, l)| RightOp::Upsert(k, l)),
        2 => (0u32..8).prop_map(RightOp::Remove),
        1 => prop::collection::vec((0u32..8, 0u32..3), 0..5).prop_map(RightOp::Reload),
    ]
}

/// Reference model: right items in global insertion order.
#[derive(Default)]
struct Model {
    items: Vec<(u32, u32)>,
}

impl Model {
    fn upsert(&mut self, key: u32, link: u32) {
        match self.items.iter().position(|(k, _)| *k == key) {
            Some(i) if self.items[i].1 == link => {}
            Some(i) => {
                self.items.remove(i);
                self.items.push((key, link));
            }
            None => self.items.push((key, link)),
        }
    }

    fn remove(&mut self, key: u32) {
        self.items.retain(|(k, _)| *k != key);
    }

    fn keys_for(&self, link: u32) -> Vec<u32> {
        self.items.iter().filter(|(_, l)| *l == link).map(|(k, _)| *k).collect()
    }
}

proptest! {
    #[test]
    fn prop_many_lists_match_model(ops in prop::collection::vec(right_op(), 1..60)) {
        let source: Channel<Notification<Right>> = Channel::new();
        let store = many_store(&source);
        let holders: Vec<Holder> = vec![holder(0, 0), holder(1, 0), holder(2, 1), holder(3, 2)];
        for h in &holders {
            store.left_added(&h.id, h, h);
        }

        let mut model = Model::default();
        for op in ops {
            match op {
                RightOp::Upsert(key, link) => {
                    model.upsert(key, link);
                    source.send(&Notification::update(vec![(key, link, "x")]));
                }
                RightOp::Remove(key) => {
                    model.remove(key);
                    source.send(&Notification::remove(vec![(key, 0, "x")]));
                }
                RightOp::Reload(items) => {
                    model = Model::default();
                    for (key, link) in &items {
                        model.upsert(*key, *link);
                    }
                    let batch = items.iter().map(|(k, l)| (*k, *l, "x")).collect();
                    source.send(&Notification::reload(batch));
                }
            }

            for h in &holders {
                let keys: Vec<u32> = h.items.to_vec().iter().map(|r| r.0).collect();
                prop_assert_eq!(keys, model.keys_for(h.link));
            }
        }
        prop_assert_eq!(store.right_count(), model.items.len());
    }
}
