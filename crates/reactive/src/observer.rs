//! Observer and observable traits.
//!
//! An `Observer<T>` receives values, errors and a completion signal from
//! an `Observable<T>`. Handlers return `Result` so a failing subscriber can
//! be isolated: the channel routes its error back to that subscriber's own
//! `on_error` and keeps delivering to everyone else.

use crate::subscription::Subscription;
use braid_core::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Receiver side of a push-based stream.
pub trait Observer<T>: Send + Sync {
    /// Handles one value.
    fn on_next(&self, value: &T) -> Result<()>;

    /// Handles an error routed to this observer.
    fn on_error(&self, _error: &Error) {}

    /// Handles stream completion.
    fn on_completed(&self) -> Result<()> {
        Ok(())
    }
}

/// Producer side of a push-based stream.
pub trait Observable<T> {
    /// Registers `observer` and returns the capability that detaches it.
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription;
}

type NextFn<T> = Box<dyn Fn(&T) -> Result<()> + Send + Sync>;
type ErrorFn = Box<dyn Fn(&Error) + Send + Sync>;
type CompletedFn = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// An observer assembled from closures.
///
/// # Example
///
/// ```rust
/// use braid_reactive::{Channel, FnObserver, Observable};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = seen.clone();
///
/// let channel: Channel<u32> = Channel::new();
/// let _sub = channel.subscribe(FnObserver::infallible(move |v: &u32| {
///     counter.fetch_add(*v as usize, Ordering::SeqCst);
/// }).into_arc());
///
/// channel.send(&5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
pub struct FnObserver<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    completed: Option<CompletedFn>,
}

impl<T> FnObserver<T> {
    /// Creates an observer from a fallible value handler.
    pub fn new<F>(next: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            next: Box::new(next),
            error: None,
            completed: None,
        }
    }

    /// Creates an observer from a value handler that cannot fail.
    pub fn infallible<F>(next: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::new(move |value| {
            next(value);
            Ok(())
        })
    }

    /// Sets the error handler.
    pub fn with_error<F>(mut self, error: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(error));
        self
    }

    /// Sets the completion handler.
    pub fn with_completed<F>(mut self, completed: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.completed = Some(Box::new(completed));
        self
    }

    /// Wraps the observer for subscription.
    pub fn into_arc(self) -> Arc<dyn Observer<T>>
    where
        T: 'static,
    {
        Arc::new(self)
    }
}

impl<T> Observer<T> for FnObserver<T> {
    #[inline]
    fn on_next(&self, value: &T) -> Result<()> {
        (self.next)(value)
    }

    fn on_error(&self, error: &Error) {
        if let Some(handler) = &self.error {
            handler(error);
        }
    }

    fn on_completed(&self) -> Result<()> {
        match &self.completed {
            Some(handler) => handler(),
            None => Ok(()),
        }
    }
}

impl<T> fmt::Debug for FnObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver")
            .field("error", &self.error.is_some())
            .field("completed", &self.completed.is_some())
            .finish()
    }
}
