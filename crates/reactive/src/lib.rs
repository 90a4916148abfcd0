//! Braid Reactive - Push-based notification substrate for Braid.
//!
//! This crate implements the minimal reactive plumbing the join stores run
//! on. Every operation is synchronous and runs to completion on the
//! caller's thread; nothing here owns a scheduler.
//!
//! # Core Concepts
//!
//! - `Observer` / `Observable`: Receiver and producer sides of a stream
//! - `Channel`: Fan-out subject with a copy-on-write subscriber snapshot
//! - `Subscription`: Capability that detaches an observer when released
//! - `Multiplexer`: Merges many upstream streams into one channel, with
//!   optional dispatch of every emission onto a caller-chosen context
//!
//! # Delivery Guarantees
//!
//! - A send only reaches subscribers registered before it started
//! - A failing subscriber gets its error on its own `on_error` path; the
//!   remaining subscribers still receive the value
//! - Completion faults go to the channel's own fault handler and the
//!   subscriber list is cleared afterwards
//!
//! # Example
//!
//! ```rust
//! use braid_core::Notification;
//! use braid_reactive::{Channel, FnObserver, Observable};
//! use std::sync::{Arc, Mutex};
//!
//! let source: Channel<Notification<&str>> = Channel::new();
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let sink = log.clone();
//!
//! let _sub = source.subscribe(
//!     FnObserver::infallible(move |n: &Notification<&str>| {
//!         sink.lock().unwrap().push(n.len());
//!     })
//!     .into_arc(),
//! );
//!
//! source.send(&Notification::add(vec!["a", "b"]));
//! assert_eq!(*log.lock().unwrap(), vec![2]);
//! ```

pub mod channel;
pub mod multiplexer;
pub mod observer;
pub mod subscription;

pub use channel::{Channel, WeakChannel};
pub use multiplexer::{Dispatcher, Job, Multiplexer, SourceId};
pub use observer::{FnObserver, Observable, Observer};
pub use subscription::{Subscription, SubscriptionId};

// Re-export the wire types every stream carries
pub use braid_core::{Action, Error, KeyValue, Notification, Result};
