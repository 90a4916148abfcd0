//! Braid Index - Pooled containers for the Braid join engine.
//!
//! This crate provides the allocation-free building blocks the join stores
//! are made of:
//!
//! - `Pool<T>`: Object-recycling pool with a factory and a free stack
//! - `NodeArena<K, V>`: Slot storage for linked nodes addressed by `NodeId`
//! - `OrderedKeyedList<K, V>`: Hash index + doubly linked list with O(1)
//!   keyed operations and insertion-order iteration
//!
//! # Example
//!
//! ```rust
//! use braid_index::{OrderedKeyedList, Pool};
//!
//! // Stage touched items, deduplicated by key
//! let mut staged = OrderedKeyedList::new();
//! staged.set(7, "first touch");
//! staged.set(3, "other");
//! staged.set(7, "second touch");
//!
//! let batch = staged.flush_values();
//! assert_eq!(batch, vec!["second touch", "other"]);
//!
//! // Recycle buckets instead of reallocating them
//! let mut pool: Pool<Vec<u32>> = Pool::default();
//! let mut bucket = pool.get();
//! bucket.push(1);
//! pool.free(bucket);
//! assert!(pool.get().is_empty());
//! ```

#![no_std]

extern crate alloc;

pub mod arena;
pub mod ordered;
pub mod pool;
pub mod stats;

pub use arena::{Node, NodeArena, NodeId};
pub use ordered::{Iter, OrderedKeyedList};
pub use pool::{Factory, Pool, Recycle};
pub use stats::PoolStats;
