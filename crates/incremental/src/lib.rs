//! Braid Incremental - Incremental join stores for Braid repositories.
//!
//! A repository builds values from a left source. Each join declared on it
//! pulls in a right source through a join store, which keeps the values in
//! step with right-side changes without recomputing them from scratch.
//!
//! # Join Modes
//!
//! - `BuildJoinStore`: Emits the keys of left items whose right item
//!   changed so the repository rebuilds them
//! - `UpdateJoinStore`: Patches existing values in place and forwards them
//!   to the repository's outgoing stream
//! - `ManyJoinStore`: Keeps an ordered list of right items inside each
//!   value
//!
//! # Concurrency
//!
//! Every store of a repository shares one `JoinMutex`. The input guard
//! serializes all association-state mutation; the output guard keeps
//! emissions in processing order. Everything runs synchronously on the
//! caller's thread.
//!
//! # Example
//!
//! ```rust
//! use braid_core::{KeyValue, Notification};
//! use braid_incremental::{BuildJoinStore, JoinConfig, JoinMutex, JoinStore};
//! use braid_reactive::{Channel, FnObserver};
//! use std::sync::{Arc, Mutex};
//!
//! // Orders (id, customer_id) joined with customers (id, name)
//! type Order = (u32, u32);
//! type Customer = (u32, &'static str);
//!
//! let customers: Channel<Notification<Customer>> = Channel::new();
//! let config = JoinConfig::new("customers", |o: &Order| o.1, |c: &Customer| c.0);
//! let store: BuildJoinStore<u32, Order, (), Customer, u32> =
//!     BuildJoinStore::new(config, &customers, Arc::new(JoinMutex::new()));
//!
//! let rebuilt = Arc::new(Mutex::new(Vec::new()));
//! let sink = rebuilt.clone();
//! let _sub = store
//!     .subscribe(
//!         FnObserver::infallible(move |n: &Notification<KeyValue<u32, Order>>| {
//!             sink.lock().unwrap().extend(n.new_items.iter().map(|kv| *kv.key()));
//!         })
//!         .into_arc(),
//!     )
//!     .unwrap();
//!
//! store.left_added(&1, &(1, 7), &());
//! store.left_added(&2, &(2, 7), &());
//! customers.send(&Notification::add(vec![(7, "Ada")]));
//!
//! assert_eq!(*rebuilt.lock().unwrap(), vec![1, 2]);
//! ```

pub mod join;
pub mod mutex;

pub use join::{
    BuildJoinStore, FilterFn, JoinConfig, JoinItem, JoinKey, JoinMode, JoinStore, KeyFn, ListGetter,
    ManyJoinStore, SharedList, UpdateJoinStore, Updater,
};
pub use mutex::{InputGuard, JoinMutex, OutputGuard};
