//! Ownership store contract.
//!
//! The store is the sole synchronizer between balancer instances. The core
//! depends on just two operations, listing the scoped records and
//! conditionally writing a batch of them, so backends (blob containers,
//! databases, the in-memory double in [`crate::memory`]) plug in behind
//! this trait without the balancer knowing anything about transport,
//! authentication, or serialization.
//!
//! # Optimistic concurrency
//!
//! Every record carries an opaque version token assigned by the store. A
//! write in a [`claim_ownership`](OwnershipStore::claim_ownership) batch is
//! accepted only when the submitted token matches the store's current one
//! (or when neither side has a record yet). A rejected write is **not** an
//! error: the record is silently omitted from the returned accept set, and
//! the submitting instance learns about the conflict from its next listing.
//! Only transport-level failures fail the call itself.

use async_trait::async_trait;
use thiserror::Error;

use crate::ownership::PartitionOwnership;

/// Result type for ownership store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Transport-level failure from an ownership store backend.
///
/// Backends classify their own failures: network resets, throttling, and
/// 5xx-style responses are transient and worth retrying on the next cycle;
/// authorization failures and malformed requests are permanent.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation failed but is expected to succeed on retry.
    #[error("transient ownership store failure: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The operation failed and retrying will not help.
    #[error("permanent ownership store failure: {0}")]
    Permanent(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap a cause as a transient failure.
    pub fn transient(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError::Transient(source.into())
    }

    /// Wrap a cause as a permanent failure.
    pub fn permanent(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError::Permanent(source.into())
    }

    /// Whether the failure is expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Shared ownership store for a fleet of balancer instances.
///
/// Implementations must apply the optimistic-concurrency rule per record
/// and independently within a batch: one rejected record does not affect
/// its neighbors.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// List every ownership record under the scope, including expired and
    /// unowned ones. No filtering, no ordering guarantees.
    async fn list_ownership(
        &self,
        fully_qualified_namespace: &str,
        event_hub_name: &str,
        consumer_group: &str,
    ) -> StoreResult<Vec<PartitionOwnership>>;

    /// Attempt a batch of conditional writes.
    ///
    /// Returns exactly the records whose write was accepted, each carrying
    /// the fresh version token the store assigned. Rejected records are
    /// silently omitted. A transport failure fails the whole call and
    /// leaves the acceptance of individual records unknown; callers must
    /// reconcile through the next listing.
    async fn claim_ownership(
        &self,
        requested: Vec<PartitionOwnership>,
    ) -> StoreResult<Vec<PartitionOwnership>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(msg: &str) -> Box<dyn std::error::Error + Send + Sync> {
        msg.to_string().into()
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::transient(boxed("throttled")).is_transient());
        assert!(!StoreError::permanent(boxed("forbidden")).is_transient());
    }

    #[test]
    fn test_display_includes_cause() {
        let err = StoreError::transient(boxed("503 service unavailable"));
        let display = format!("{}", err);
        assert!(display.contains("transient"));
        assert!(display.contains("503"));
    }

    #[test]
    fn test_trait_is_object_safe() {
        fn assert_object_safe(_store: Option<&dyn OwnershipStore>) {}
        assert_object_safe(None);
    }
}
