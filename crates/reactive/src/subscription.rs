//! Subscription capabilities.
//!
//! Subscribing to a channel returns a `Subscription`. Releasing it, either
//! explicitly through `unsubscribe` or by dropping it, detaches the
//! observer. Releasing twice is a no-op.

use parking_lot::Mutex;
use std::fmt;

/// Unique identifier for a subscription within one channel.
pub type SubscriptionId = u64;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A capability that detaches an observer when released.
pub struct Subscription {
    /// Identifier assigned by the issuing channel
    id: SubscriptionId,
    /// Detach action; `None` once released
    release: Mutex<Option<ReleaseFn>>,
}

impl Subscription {
    /// Creates a subscription that runs `release` when released.
    pub fn new<F>(id: SubscriptionId, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Creates an already released subscription.
    pub fn empty() -> Self {
        Self {
            id: 0,
            release: Mutex::new(None),
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is still attached.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.release.lock().is_some()
    }

    /// Detaches the observer.
    pub fn unsubscribe(&self) {
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Drops the capability without detaching the observer.
    ///
    /// The observer then stays attached for the channel's lifetime.
    pub fn forget(self) {
        self.release.lock().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.get_mut().take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_subscription_new() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new(1, counting(&count));
        assert_eq!(sub.id(), 1);
        assert!(sub.is_active());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_unsubscribe_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new(1, counting(&count));

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_drop_releases() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _sub = Subscription::new(1, counting(&count));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_forget() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new(1, counting(&count));
        sub.forget();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_empty() {
        let sub = Subscription::empty();
        assert!(!sub.is_active());
        sub.unsubscribe();
    }
}
