//! In-memory ownership store.
//!
//! A full-featured implementation of [`OwnershipStore`] backed by a map,
//! with the same optimistic-concurrency semantics a production backend
//! provides: a monotonic version counter stands in for ETags, and each
//! record in a claim batch is judged independently. Intended for tests,
//! demos, and single-process setups.
//!
//! Fault injection toggles let tests exercise the balancer's
//! transport-failure paths without a real flaky backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ownership::PartitionOwnership;
use crate::store::{OwnershipStore, StoreError, StoreResult};

/// Full scoping key for one ownership record.
type OwnershipKey = (String, String, String, String);

fn key_of(record: &PartitionOwnership) -> OwnershipKey {
    (
        record.fully_qualified_namespace.clone(),
        record.event_hub_name.clone(),
        record.consumer_group.clone(),
        record.partition_id.clone(),
    )
}

/// Map-backed ownership store with ETag-style conditional writes.
#[derive(Debug, Default)]
pub struct InMemoryOwnershipStore {
    records: RwLock<HashMap<OwnershipKey, PartitionOwnership>>,
    next_version: AtomicU64,
    fail_lists: AtomicBool,
    fail_claims: AtomicBool,
    list_calls: AtomicU64,
    claim_calls: AtomicU64,
}

impl InMemoryOwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing the conditional-write rule.
    ///
    /// Assigns a fresh version token like an accepted write would. Used by
    /// tests to seed a pre-existing fleet state.
    pub async fn seed_ownership(&self, record: PartitionOwnership) -> PartitionOwnership {
        let mut seeded = record;
        seeded.version = Some(self.mint_version());
        self.records
            .write()
            .await
            .insert(key_of(&seeded), seeded.clone());
        seeded
    }

    /// Make subsequent `list_ownership` calls fail with a transient error.
    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `claim_ownership` calls fail with a transient error.
    pub fn set_fail_claims(&self, fail: bool) {
        self.fail_claims.store(fail, Ordering::SeqCst);
    }

    /// How many `list_ownership` calls were attempted.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// How many `claim_ownership` calls were attempted.
    pub fn claim_calls(&self) -> u64 {
        self.claim_calls.load(Ordering::SeqCst)
    }

    fn mint_version(&self) -> String {
        self.next_version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Whether the conditional-write rule accepts `requested` against the
    /// store's current view of the record.
    fn write_accepted(
        current: Option<&PartitionOwnership>,
        requested: &PartitionOwnership,
    ) -> bool {
        match (current, requested.version.as_deref()) {
            // A record that never existed can only be created unconditionally.
            (None, None) => true,
            // An existing record can only be replaced with its current token.
            (Some(existing), Some(token)) => existing.version.as_deref() == Some(token),
            _ => false,
        }
    }
}

#[async_trait]
impl OwnershipStore for InMemoryOwnershipStore {
    async fn list_ownership(
        &self,
        fully_qualified_namespace: &str,
        event_hub_name: &str,
        consumer_group: &str,
    ) -> StoreResult<Vec<PartitionOwnership>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::transient("injected list failure".to_string()));
        }

        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| {
                record.fully_qualified_namespace == fully_qualified_namespace
                    && record.event_hub_name == event_hub_name
                    && record.consumer_group == consumer_group
            })
            .cloned()
            .collect())
    }

    async fn claim_ownership(
        &self,
        requested: Vec<PartitionOwnership>,
    ) -> StoreResult<Vec<PartitionOwnership>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(StoreError::transient("injected claim failure".to_string()));
        }

        let mut records = self.records.write().await;
        let mut accepted = Vec::with_capacity(requested.len());

        for proposal in requested {
            let key = key_of(&proposal);
            if Self::write_accepted(records.get(&key), &proposal) {
                let mut stored = proposal;
                stored.version = Some(self.mint_version());
                records.insert(key, stored.clone());
                accepted.push(stored);
            } else {
                debug!(
                    partition_id = %proposal.partition_id,
                    owner_id = %proposal.owner_id,
                    "conditional write rejected"
                );
            }
        }

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMESPACE: &str = "ns.example.net";
    const HUB: &str = "hub";
    const GROUP: &str = "$default";

    fn record(partition: &str, owner: &str) -> PartitionOwnership {
        PartitionOwnership::new(NAMESPACE, HUB, GROUP, partition, owner)
    }

    async fn list(store: &InMemoryOwnershipStore) -> Vec<PartitionOwnership> {
        store.list_ownership(NAMESPACE, HUB, GROUP).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_without_version_accepted() {
        let store = InMemoryOwnershipStore::new();
        let accepted = store
            .claim_ownership(vec![record("0", "consumer-a")])
            .await
            .unwrap();

        assert_eq!(accepted.len(), 1);
        assert!(accepted[0].version.is_some());
        assert_eq!(list(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_over_existing_record_rejected() {
        let store = InMemoryOwnershipStore::new();
        store
            .claim_ownership(vec![record("0", "consumer-a")])
            .await
            .unwrap();

        // A second versionless create must lose.
        let accepted = store
            .claim_ownership(vec![record("0", "consumer-b")])
            .await
            .unwrap();
        assert!(accepted.is_empty());

        let records = list(&store).await;
        assert_eq!(records[0].owner_id, "consumer-a");
    }

    #[tokio::test]
    async fn test_current_token_accepted_and_rotated() {
        let store = InMemoryOwnershipStore::new();
        let first = store
            .claim_ownership(vec![record("0", "consumer-a")])
            .await
            .unwrap()
            .remove(0);

        let second = store
            .claim_ownership(vec![first.claimed_by("consumer-b")])
            .await
            .unwrap()
            .remove(0);

        assert_eq!(second.owner_id, "consumer-b");
        assert_ne!(second.version, first.version);
    }

    #[tokio::test]
    async fn test_stale_token_rejected() {
        let store = InMemoryOwnershipStore::new();
        let original = store
            .claim_ownership(vec![record("0", "consumer-a")])
            .await
            .unwrap()
            .remove(0);

        // consumer-b steals with the current token.
        store
            .claim_ownership(vec![original.claimed_by("consumer-b")])
            .await
            .unwrap();

        // consumer-a's renewal still carries the stale token and must lose.
        let accepted = store
            .claim_ownership(vec![original.renewed()])
            .await
            .unwrap();
        assert!(accepted.is_empty());

        let records = list(&store).await;
        assert_eq!(records[0].owner_id, "consumer-b");
    }

    #[tokio::test]
    async fn test_batch_records_judged_independently() {
        let store = InMemoryOwnershipStore::new();
        let held = store
            .claim_ownership(vec![record("0", "consumer-a")])
            .await
            .unwrap()
            .remove(0);

        let mut stale = held.clone();
        stale.version = Some("no-such-token".to_string());

        let accepted = store
            .claim_ownership(vec![stale.renewed(), record("1", "consumer-a")])
            .await
            .unwrap();

        // The stale renewal is dropped, the fresh create goes through.
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].partition_id, "1");
    }

    #[tokio::test]
    async fn test_scope_filtering() {
        let store = InMemoryOwnershipStore::new();
        store
            .claim_ownership(vec![
                record("0", "consumer-a"),
                PartitionOwnership::new(NAMESPACE, "other-hub", GROUP, "0", "consumer-a"),
            ])
            .await
            .unwrap();

        assert_eq!(list(&store).await.len(), 1);
        assert_eq!(
            store
                .list_ownership(NAMESPACE, "other-hub", GROUP)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_fault_injection_and_counters() {
        let store = InMemoryOwnershipStore::new();

        store.set_fail_lists(true);
        let err = store
            .list_ownership(NAMESPACE, HUB, GROUP)
            .await
            .unwrap_err();
        assert!(err.is_transient());

        store.set_fail_claims(true);
        let err = store
            .claim_ownership(vec![record("0", "consumer-a")])
            .await
            .unwrap_err();
        assert!(err.is_transient());

        store.set_fail_lists(false);
        store.set_fail_claims(false);
        assert!(list(&store).await.is_empty());

        assert_eq!(store.list_calls(), 2);
        assert_eq!(store.claim_calls(), 1);
    }

    #[tokio::test]
    async fn test_seed_ownership_assigns_version() {
        let store = InMemoryOwnershipStore::new();
        let seeded = store.seed_ownership(record("3", "consumer-a")).await;
        assert!(seeded.version.is_some());

        let records = list(&store).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], seeded);
    }
}
