//! Crate-level error types.
//!
//! The balancer distinguishes three failure classes:
//!
//! - **Store failures**: a `list` or `claim` call against the ownership
//!   store failed at the transport level. These are wrapped in
//!   [`BalancerError::Store`] with the originating operation attached and
//!   the [`StoreError`] preserved as the source. The driver is expected to
//!   log and resume on the next cycle.
//! - **Cancellation**: the driver's cancellation token fired. Surfaced as
//!   [`BalancerError::Cancelled`], never retried.
//! - **Configuration errors**: invalid construction input. Fatal.
//!
//! Optimistic-concurrency rejections are *not* errors anywhere in this
//! crate: a rejected write is silently omitted from the accept set and the
//! instance discovers the ownership change on its next listing.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;

/// Errors surfaced by the partition load balancer.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// A call against the ownership store failed at the transport level.
    #[error("ownership store failure during {operation}")]
    Store {
        /// Which balancer operation issued the failing call.
        operation: &'static str,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The load balancing cycle was cancelled by the driver.
    #[error("load balancing cycle was cancelled")]
    Cancelled,

    /// Invalid balancer configuration. Raised at construction time.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BalancerError {
    pub(crate) fn store(operation: &'static str, source: StoreError) -> Self {
        BalancerError::Store { operation, source }
    }

    /// Whether the driver should expect the next cycle to succeed.
    ///
    /// Transient store failures resolve themselves; cancellation and
    /// configuration errors do not.
    pub fn is_retriable(&self) -> bool {
        match self {
            BalancerError::Store { source, .. } => source.is_transient(),
            BalancerError::Cancelled => false,
            BalancerError::Config(_) => false,
        }
    }

    /// Whether this error is the cancellation signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BalancerError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn io_failure() -> Box<dyn std::error::Error + Send + Sync> {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }

    #[test]
    fn test_store_error_display_names_operation() {
        let err = BalancerError::store("renewal", StoreError::transient(io_failure()));
        let display = format!("{}", err);
        assert!(display.contains("renewal"));
    }

    #[test]
    fn test_store_error_preserves_source() {
        let err = BalancerError::store("listing", StoreError::transient(io_failure()));
        let source = err.source().expect("store error must carry a source");
        assert!(source.to_string().contains("transient"));
        // The original cause is two levels down.
        let cause = source.source().expect("store error must carry a cause");
        assert!(cause.to_string().contains("connection reset"));
    }

    #[test]
    fn test_transient_store_error_is_retriable() {
        let err = BalancerError::store("claim", StoreError::transient(io_failure()));
        assert!(err.is_retriable());
    }

    #[test]
    fn test_permanent_store_error_is_not_retriable() {
        let err = BalancerError::store("claim", StoreError::permanent(io_failure()));
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_cancelled_is_not_retriable() {
        assert!(!BalancerError::Cancelled.is_retriable());
        assert!(BalancerError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_config_error_display() {
        let err = BalancerError::Config("owner_id must not be empty".to_string());
        let display = format!("{}", err);
        assert!(display.contains("configuration error"));
        assert!(display.contains("owner_id"));
        assert!(!err.is_retriable());
        assert!(!err.is_cancellation());
    }
}
