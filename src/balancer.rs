//! The cooperative partition load balancer.
//!
//! Responsibilities:
//! - Renew this instance's ownership records on every cycle
//! - Rebuild the fleet-wide distribution from a fresh store listing
//! - Claim at most one partition per cycle: an orphan first, then a steal
//!   from an over-provisioned peer
//! - Relinquish all holdings on shutdown
//!
//! One cycle runs to completion before the next begins; the tick entry
//! point takes `&mut self`, so the borrow checker enforces the
//! no-concurrent-cycles contract. Across processes there is no ordering at
//! all: the ownership store's conditional writes are the only
//! synchronizer, and two instances that pick the same target in the same
//! cycle simply race, with at most one winner.
//!
//! Two instances may briefly both read the same partition around an
//! ownership change; the overlap is bounded by the expiration window and
//! reconciled through the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BalancerConfig;
use crate::distribution::OwnershipDistribution;
use crate::error::{BalancerError, BalancerResult};
use crate::ownership::PartitionOwnership;
use crate::store::{OwnershipStore, StoreError};

/// One fleet member's view of the shared partition pool.
///
/// Every process in the fleet runs its own instance with a distinct
/// `owner_id` against the same store scope. The instances never talk to
/// each other; convergence to a fair distribution emerges from each one
/// independently applying the same claim rules to the same store state,
/// with randomized target selection breaking the symmetry between them.
#[derive(Debug)]
pub struct PartitionLoadBalancer<S: OwnershipStore> {
    store: Arc<S>,
    config: BalancerConfig,

    /// Records this instance last wrote successfully, keyed by partition.
    /// Entries appear on claim, refresh on renewal, and drop out when a
    /// peer's write supersedes ours or we relinquish.
    owned: HashMap<String, PartitionOwnership>,
}

impl<S: OwnershipStore> PartitionLoadBalancer<S> {
    /// Create a balancer instance. Fails fast on invalid configuration.
    pub fn new(store: Arc<S>, config: BalancerConfig) -> BalancerResult<Self> {
        config.validate()?;
        info!(
            owner_id = %config.owner_id,
            event_hub = %config.event_hub_name,
            consumer_group = %config.consumer_group,
            expiration_secs = config.ownership_expiration.as_secs(),
            "created partition load balancer"
        );
        Ok(Self {
            store,
            config,
            owned: HashMap::new(),
        })
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Partitions this instance currently believes it owns. Safe to call
    /// between cycles; the set only changes inside a cycle or relinquish.
    pub fn owned_partition_ids(&self) -> HashSet<String> {
        self.owned.keys().cloned().collect()
    }

    pub fn owned_partition_count(&self) -> usize {
        self.owned.len()
    }

    /// Run one load balancing cycle: renew, list, analyze, and attempt at
    /// most one claim.
    ///
    /// Returns the newly claimed record if the claim landed, `None` when
    /// the cycle took no action or the claim lost the conditional-write
    /// race. Store transport failures abort the cycle without mutating
    /// holdings beyond what renewal already applied; the next cycle
    /// reconciles through a fresh listing.
    pub async fn run_load_balancing_cycle(
        &mut self,
        all_partition_ids: &[String],
        cancel: &CancellationToken,
    ) -> BalancerResult<Option<PartitionOwnership>> {
        self.renew_ownership(cancel).await?;

        let snapshot = self.list_snapshot(cancel).await?;
        let distribution = OwnershipDistribution::analyze(
            &snapshot,
            all_partition_ids,
            &self.config.owner_id,
            self.config.ownership_expiration,
        );

        debug!(
            owner_id = %self.config.owner_id,
            active_owners = distribution.active_owner_count(),
            min_share = distribution.min_share(),
            own_holdings = distribution.own_holdings(),
            unclaimed = distribution.unclaimed().len(),
            "evaluated ownership distribution"
        );

        if !distribution.should_attempt_claim() {
            debug!(
                owner_id = %self.config.owner_id,
                "holdings at fair share, leaving the distribution alone"
            );
            return Ok(None);
        }

        let Some(target) = self.select_claim_target(&distribution) else {
            return Ok(None);
        };

        self.claim_partition(&snapshot, &target, cancel).await
    }

    /// Release every holding on shutdown.
    ///
    /// Writes each record back with an empty owner and its timestamp
    /// preserved, so peers see the partitions as immediately available.
    /// The local map is cleared regardless of which writes were accepted:
    /// the process is exiting, and anything left behind lapses through the
    /// expiration window.
    pub async fn relinquish_ownership(&mut self, cancel: &CancellationToken) -> BalancerResult<()> {
        if self.owned.is_empty() {
            return Ok(());
        }
        ensure_not_cancelled(cancel)?;

        let batch: Vec<PartitionOwnership> =
            self.owned.values().map(PartitionOwnership::released).collect();
        let holdings = batch.len();

        let result = self.store.claim_ownership(batch).await;
        self.owned.clear();

        match result {
            Ok(accepted) => {
                info!(
                    owner_id = %self.config.owner_id,
                    holdings,
                    released = accepted.len(),
                    "relinquished partition ownership"
                );
                Ok(())
            }
            Err(source) => {
                warn!(
                    owner_id = %self.config.owner_id,
                    error = %source,
                    "relinquish failed; remaining claims will lapse via expiration"
                );
                Err(abort_cycle(cancel, "relinquish", source))
            }
        }
    }

    /// Refresh the timestamp on every holding before any planning.
    ///
    /// The accept set *replaces* the holdings map wholesale: records a peer
    /// claimed away since our last write carry a stale version token, get
    /// rejected, and drop out; that is how this instance learns it lost a
    /// partition. A transport failure ends the cycle early and
    /// leaves the map untouched for the next attempt.
    async fn renew_ownership(&mut self, cancel: &CancellationToken) -> BalancerResult<()> {
        if self.owned.is_empty() {
            return Ok(());
        }
        ensure_not_cancelled(cancel)?;

        debug!(
            owner_id = %self.config.owner_id,
            holdings = self.owned.len(),
            "renewing ownership"
        );
        let batch: Vec<PartitionOwnership> =
            self.owned.values().map(PartitionOwnership::renewed).collect();

        let accepted = match self.store.claim_ownership(batch).await {
            Ok(accepted) => accepted,
            Err(source) => {
                warn!(
                    owner_id = %self.config.owner_id,
                    error = %source,
                    "ownership renewal failed"
                );
                return Err(abort_cycle(cancel, "renewal", source));
            }
        };

        let renewed: HashMap<String, PartitionOwnership> = accepted
            .into_iter()
            .map(|record| (record.partition_id.clone(), record))
            .collect();

        for partition_id in self.owned.keys() {
            if !renewed.contains_key(partition_id) {
                warn!(
                    owner_id = %self.config.owner_id,
                    partition_id = %partition_id,
                    "partition claimed away by a peer"
                );
            }
        }

        debug!(
            owner_id = %self.config.owner_id,
            holdings = renewed.len(),
            "ownership renewal complete"
        );
        self.owned = renewed;
        Ok(())
    }

    async fn list_snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> BalancerResult<Vec<PartitionOwnership>> {
        ensure_not_cancelled(cancel)?;
        match self
            .store
            .list_ownership(
                &self.config.fully_qualified_namespace,
                &self.config.event_hub_name,
                &self.config.consumer_group,
            )
            .await
        {
            Ok(snapshot) => Ok(snapshot),
            Err(source) => {
                warn!(
                    owner_id = %self.config.owner_id,
                    error = %source,
                    "listing ownership failed"
                );
                Err(abort_cycle(cancel, "listing", source))
            }
        }
    }

    /// Pick the partition to go after this cycle, or nothing.
    ///
    /// Priority: orphans, then holdings of owners above the fair-share
    /// ceiling, then (only while still below the floor) holdings of owners
    /// sitting exactly at the ceiling. Selection within each pool is
    /// uniformly random: every instance runs this same routine over the
    /// same snapshot, and randomization keeps two eligible instances from
    /// converging on the same victim every cycle.
    fn select_claim_target(&self, distribution: &OwnershipDistribution) -> Option<String> {
        let unclaimed = distribution.unclaimed();
        if !unclaimed.is_empty() {
            let choice = &unclaimed[fastrand::usize(..unclaimed.len())];
            debug!(
                owner_id = %self.config.owner_id,
                partition_id = %choice,
                candidates = unclaimed.len(),
                "claiming an unowned partition"
            );
            return Some(choice.clone());
        }

        let over: Vec<&str> = distribution
            .over_capacity_partitions()
            .into_iter()
            .filter(|id| !self.owned.contains_key(*id))
            .collect();
        if !over.is_empty() {
            let choice = over[fastrand::usize(..over.len())];
            info!(
                owner_id = %self.config.owner_id,
                partition_id = %choice,
                candidates = over.len(),
                "stealing from an owner above the fair-share ceiling"
            );
            return Some(choice.to_string());
        }

        if distribution.own_holdings() < distribution.min_share() {
            let at_max = distribution.at_capacity_partitions();
            if !at_max.is_empty() {
                let choice = at_max[fastrand::usize(..at_max.len())];
                info!(
                    owner_id = %self.config.owner_id,
                    partition_id = %choice,
                    candidates = at_max.len(),
                    "stealing from an owner at the fair-share ceiling"
                );
                return Some(choice.to_string());
            }
        }

        // At the floor with nobody over-provisioned: taking from an
        // at-ceiling owner would only relocate the imbalance.
        debug!(
            owner_id = %self.config.owner_id,
            "no claimable partition this cycle"
        );
        None
    }

    /// Submit the conditional write for the chosen partition.
    async fn claim_partition(
        &mut self,
        snapshot: &[PartitionOwnership],
        partition_id: &str,
        cancel: &CancellationToken,
    ) -> BalancerResult<Option<PartitionOwnership>> {
        ensure_not_cancelled(cancel)?;

        // The version token must come from the latest observation of the
        // record, or the conditional write is doomed. No record at all
        // means the partition has never been owned and the write is an
        // unconditional create.
        let proposal = snapshot
            .iter()
            .filter(|record| record.partition_id == partition_id)
            .max_by_key(|record| record.last_modified)
            .map(|record| record.claimed_by(&self.config.owner_id))
            .unwrap_or_else(|| {
                PartitionOwnership::new(
                    &self.config.fully_qualified_namespace,
                    &self.config.event_hub_name,
                    &self.config.consumer_group,
                    partition_id,
                    &self.config.owner_id,
                )
            });

        debug!(
            owner_id = %self.config.owner_id,
            partition_id,
            "attempting ownership claim"
        );

        let accepted = match self.store.claim_ownership(vec![proposal]).await {
            Ok(accepted) => accepted,
            Err(source) => {
                warn!(
                    owner_id = %self.config.owner_id,
                    partition_id,
                    error = %source,
                    "ownership claim failed"
                );
                return Err(abort_cycle(cancel, "claim", source));
            }
        };

        match accepted.into_iter().next() {
            Some(record) => {
                info!(
                    owner_id = %self.config.owner_id,
                    partition_id,
                    "claimed partition ownership"
                );
                self.owned
                    .insert(record.partition_id.clone(), record.clone());
                Ok(Some(record))
            }
            None => {
                debug!(
                    owner_id = %self.config.owner_id,
                    partition_id,
                    "ownership claim lost to a peer"
                );
                Ok(None)
            }
        }
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> BalancerResult<()> {
    if cancel.is_cancelled() {
        return Err(BalancerError::Cancelled);
    }
    Ok(())
}

/// Map a failed store call to the error the cycle surfaces: cancellation
/// wins over the transport failure when both happened.
fn abort_cycle(
    cancel: &CancellationToken,
    operation: &'static str,
    source: StoreError,
) -> BalancerError {
    if cancel.is_cancelled() {
        BalancerError::Cancelled
    } else {
        BalancerError::store(operation, source)
    }
}
