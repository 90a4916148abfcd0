//! Join configuration.
//!
//! A `JoinConfig` carries what every join mode needs from the declaration
//! layer: the right source name (used in logs and errors), the getters that
//! resolve left and right items to their link key, and an optional filter
//! deciding which right items participate.

use std::fmt;
use std::sync::Arc;

/// Resolves an item to a key.
pub type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Decides whether a right item participates in the join.
pub type FilterFn<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Configuration shared by every join store mode.
///
/// # Example
///
/// ```rust
/// use braid_incremental::JoinConfig;
///
/// struct Order { customer_id: u32 }
/// struct Customer { id: u32, active: bool }
///
/// let config = JoinConfig::new(
///     "customers",
///     |order: &Order| order.customer_id,
///     |customer: &Customer| customer.id,
/// )
/// .with_filter(|customer: &Customer| customer.active);
///
/// assert_eq!(config.name(), "customers");
/// assert_eq!(config.left_link(&Order { customer_id: 4 }), 4);
/// assert!(!config.accepts(&Customer { id: 4, active: false }));
/// ```
pub struct JoinConfig<L, R, LK> {
    /// Right source name
    name: String,
    left_link: KeyFn<L, LK>,
    right_link: KeyFn<R, LK>,
    filter: Option<FilterFn<R>>,
}

impl<L, R, LK> Clone for JoinConfig<L, R, LK> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            left_link: self.left_link.clone(),
            right_link: self.right_link.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<L, R, LK> JoinConfig<L, R, LK> {
    /// Creates a configuration from the right source name and both link
    /// key getters.
    pub fn new<FL, FR>(name: impl Into<String>, left_link: FL, right_link: FR) -> Self
    where
        FL: Fn(&L) -> LK + Send + Sync + 'static,
        FR: Fn(&R) -> LK + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            left_link: Arc::new(left_link),
            right_link: Arc::new(right_link),
            filter: None,
        }
    }

    /// Only right items for which `filter` returns true participate.
    ///
    /// An item that fails the filter is treated as removed.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Returns the right source name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a left item's link key.
    #[inline]
    pub fn left_link(&self, left: &L) -> LK {
        (self.left_link)(left)
    }

    /// Resolves a right item's link key.
    #[inline]
    pub fn right_link(&self, right: &R) -> LK {
        (self.right_link)(right)
    }

    /// Returns true if `right` passes the filter (or no filter is set).
    #[inline]
    pub fn accepts(&self, right: &R) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(right))
    }

    /// Returns true if a filter is configured.
    #[inline]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }
}

impl<L, R, LK> fmt::Debug for JoinConfig<L, R, LK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinConfig")
            .field("name", &self.name)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}
