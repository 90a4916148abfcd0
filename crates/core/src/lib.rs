//! Braid Core - Core notification and error types for the Braid join engine.
//!
//! This crate provides the foundational types shared by every layer of the
//! engine:
//!
//! - `Notification<T>`: A batch of changes tagged with an `Action`
//! - `Action`: What a batch means to the receiver (Add, Update, Remove, Reload)
//! - `KeyValue<K, V>`: The immutable pair produced when a staging buffer is flushed
//! - `Error`: Error types for channel delivery and join store operations
//!
//! # Example
//!
//! ```rust
//! use braid_core::{Action, Notification};
//!
//! let batch = Notification::add(vec![1, 2, 3]);
//! assert_eq!(batch.action, Action::Add);
//! assert_eq!(batch.items(), &[1, 2, 3]);
//!
//! let removed = Notification::remove(vec![2]);
//! assert!(removed.new_items.is_empty());
//! assert_eq!(removed.items(), &[2]);
//! ```

#![no_std]

extern crate alloc;

mod error;
mod notification;

pub use error::{Error, Result};
pub use notification::{Action, KeyValue, Notification};
