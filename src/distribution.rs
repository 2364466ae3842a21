//! Per-cycle analysis of the fleet-wide ownership state.
//!
//! [`OwnershipDistribution`] is rebuilt from scratch on every cycle out of
//! a fresh store snapshot. It splits records into active claims and
//! orphans, groups the active ones by owner, and derives the fair-share
//! targets the claim planner works against. It carries no state across
//! cycles.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::ownership::PartitionOwnership;

/// Snapshot analysis: who actively owns what, and what is up for grabs.
///
/// The owner map always contains the analyzing instance's own key, possibly
/// with an empty holdings list, so the active owner count includes self
/// even before the first claim.
#[derive(Debug)]
pub struct OwnershipDistribution {
    owner_id: String,
    active: HashMap<String, Vec<PartitionOwnership>>,
    unclaimed: Vec<String>,
    total_partitions: usize,
}

impl OwnershipDistribution {
    /// Classify a store snapshot against the full partition id set.
    ///
    /// A record counts as active when its owner is non-empty and its age is
    /// inside `expiration`; everything else leaves its partition in the
    /// unclaimed pool. The snapshot is an unordered multiset; nothing here
    /// depends on its iteration order.
    pub fn analyze(
        snapshot: &[PartitionOwnership],
        all_partition_ids: &[String],
        owner_id: &str,
        expiration: Duration,
    ) -> Self {
        let mut active: HashMap<String, Vec<PartitionOwnership>> = HashMap::new();
        active.insert(owner_id.to_string(), Vec::new());

        let mut claimed_ids: HashSet<&str> = HashSet::new();
        for record in snapshot {
            if record.is_active(expiration) {
                claimed_ids.insert(record.partition_id.as_str());
                active
                    .entry(record.owner_id.clone())
                    .or_default()
                    .push(record.clone());
            }
        }

        let unclaimed = all_partition_ids
            .iter()
            .filter(|id| !claimed_ids.contains(id.as_str()))
            .cloned()
            .collect();

        Self {
            owner_id: owner_id.to_string(),
            active,
            unclaimed,
            total_partitions: all_partition_ids.len(),
        }
    }

    /// Number of owners with at least one record in the expiration window,
    /// plus this instance. Always at least one.
    pub fn active_owner_count(&self) -> usize {
        self.active.len()
    }

    /// Floor of a fair per-owner share.
    pub fn min_share(&self) -> usize {
        self.total_partitions / self.active_owner_count()
    }

    /// Ceiling of a fair per-owner share. In a balanced fleet every owner
    /// holds either `min_share` or `max_share` partitions.
    pub fn max_share(&self) -> usize {
        self.min_share() + 1
    }

    /// Active holdings count for an owner.
    pub fn holdings_of(&self, owner_id: &str) -> usize {
        self.active.get(owner_id).map_or(0, Vec::len)
    }

    /// Active holdings count for this instance.
    pub fn own_holdings(&self) -> usize {
        self.holdings_of(&self.owner_id)
    }

    /// Partitions with no active claim, in the order the driver listed them.
    pub fn unclaimed(&self) -> &[String] {
        &self.unclaimed
    }

    /// Whether this instance should try to claim a partition this cycle.
    ///
    /// True when the instance is below the fair-share floor, or when it
    /// sits exactly at the floor while the fleet still has leftover
    /// partitions to place (no owner is below the floor, yet someone must
    /// absorb the remainder when the division is not exact). Without the
    /// second clause convergence stalls with orphans nobody volunteers for.
    pub fn should_attempt_claim(&self) -> bool {
        let own = self.own_holdings();
        let min = self.min_share();
        own < min || (own == min && !self.any_owner_below(min))
    }

    fn any_owner_below(&self, count: usize) -> bool {
        self.active.values().any(|holdings| holdings.len() < count)
    }

    /// All partitions held by owners above the fair-share ceiling.
    /// Preferred steal targets after orphans.
    pub fn over_capacity_partitions(&self) -> Vec<&str> {
        self.partitions_where(|_, holdings| holdings.len() > self.max_share())
    }

    /// All partitions held by *other* owners sitting exactly at the
    /// ceiling. Stealing one only helps an instance that is still below
    /// the floor; taking from an at-ceiling owner otherwise just moves the
    /// imbalance around.
    pub fn at_capacity_partitions(&self) -> Vec<&str> {
        self.partitions_where(|owner, holdings| {
            owner != self.owner_id && holdings.len() == self.max_share()
        })
    }

    fn partitions_where(
        &self,
        include: impl Fn(&str, &[PartitionOwnership]) -> bool,
    ) -> Vec<&str> {
        self.active
            .iter()
            .filter(|(owner, holdings)| include(owner.as_str(), holdings.as_slice()))
            .flat_map(|(_, holdings)| holdings.iter().map(|r| r.partition_id.as_str()))
            .collect()
    }
}
