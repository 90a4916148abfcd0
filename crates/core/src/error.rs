//! Error types for Braid.

use alloc::string::String;
use thiserror::Error;

/// Result type alias for Braid operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for channel delivery and join store operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The operation is not implemented by this join store variant.
    ///
    /// This is a wiring fault and must never be retried.
    #[error("Unsupported operation: {operation} is not available on {mode} join stores")]
    Unsupported {
        operation: &'static str,
        mode: &'static str,
    },
    /// A subscriber failed while handling a value or a completion.
    #[error("Subscriber fault: {message}")]
    Subscriber { message: String },
    /// The target has already been disposed or completed.
    #[error("Disposed: {name}")]
    Disposed { name: String },
}

impl Error {
    /// Creates a capability mismatch error.
    pub fn unsupported(operation: &'static str, mode: &'static str) -> Self {
        Error::Unsupported { operation, mode }
    }

    /// Creates a subscriber fault.
    pub fn subscriber(message: impl Into<String>) -> Self {
        Error::Subscriber {
            message: message.into(),
        }
    }

    /// Creates a disposed error.
    pub fn disposed(name: impl Into<String>) -> Self {
        Error::Disposed { name: name.into() }
    }

    /// Returns true if this is a capability mismatch.
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::unsupported("get_right", "update");
        assert!(err.to_string().contains("get_right"));
        assert!(err.to_string().contains("update"));

        let err = Error::subscriber("boom");
        assert!(err.to_string().contains("boom"));

        let err = Error::disposed("orders.customer");
        assert!(err.to_string().contains("orders.customer"));
    }

    #[test]
    fn test_error_is_unsupported() {
        assert!(Error::unsupported("subscribe", "many").is_unsupported());
        assert!(!Error::subscriber("boom").is_unsupported());
        assert!(!Error::disposed("orders").is_unsupported());
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::unsupported("subscribe", "many");
        match err {
            Error::Unsupported { operation, mode } => {
                assert_eq!(operation, "subscribe");
                assert_eq!(mode, "many");
            }
            _ => panic!("Wrong error type"),
        }
    }
}
