//! Partition ownership records.
//!
//! A [`PartitionOwnership`] is the unit of coordination between balancer
//! instances. Records are immutable: every state change produces a new
//! record, and the store assigns a fresh version token when it accepts a
//! write. The balancer never invents a version token; it either copies one
//! from a prior observation or leaves it absent for a record that has never
//! existed.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A durable claim that one consumer instance is responsible for one
/// partition of an event hub.
///
/// Scoped by the `(fully_qualified_namespace, event_hub_name,
/// consumer_group)` tuple; `partition_id` is unique within that scope.
/// An empty `owner_id` marks the partition as unowned and available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOwnership {
    /// Fully qualified namespace of the event hub host.
    pub fully_qualified_namespace: String,

    /// Name of the event hub the partition belongs to.
    pub event_hub_name: String,

    /// Consumer group this fleet reads as.
    pub consumer_group: String,

    /// Identifier of the partition.
    pub partition_id: String,

    /// Identifier of the owning instance; empty means unowned.
    pub owner_id: String,

    /// Wall-clock time of the most recent write the store accepted.
    pub last_modified: SystemTime,

    /// Version token assigned by the store on the last accepted write.
    ///
    /// `None` only for records that have never been written. Required for
    /// conditional writes: the store accepts a write only when the
    /// submitted token matches its current one.
    pub version: Option<String>,
}

impl PartitionOwnership {
    /// Create a fresh record for a partition that has never been owned.
    pub fn new(
        fully_qualified_namespace: impl Into<String>,
        event_hub_name: impl Into<String>,
        consumer_group: impl Into<String>,
        partition_id: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            fully_qualified_namespace: fully_qualified_namespace.into(),
            event_hub_name: event_hub_name.into(),
            consumer_group: consumer_group.into(),
            partition_id: partition_id.into(),
            owner_id: owner_id.into(),
            last_modified: SystemTime::now(),
            version: None,
        }
    }

    /// Whether some instance currently claims this record.
    pub fn has_owner(&self) -> bool {
        !self.owner_id.is_empty()
    }

    /// Age of the record relative to the current wall clock.
    ///
    /// A `last_modified` in the future (clock skew across the fleet) counts
    /// as zero age rather than an error.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.last_modified)
            .unwrap_or(Duration::ZERO)
    }

    /// Whether this record represents a live claim.
    ///
    /// Active means owned and renewed within the expiration window.
    /// Anything else is an orphan, claimable by any instance.
    pub fn is_active(&self, expiration: Duration) -> bool {
        self.has_owner() && self.age() < expiration
    }

    /// A copy with the timestamp moved to now. Submitted by the owner on
    /// every cycle to keep the claim alive.
    pub fn renewed(&self) -> Self {
        Self {
            last_modified: SystemTime::now(),
            ..self.clone()
        }
    }

    /// A copy claiming the partition for `owner_id`, stamped now, carrying
    /// this record's version token for the conditional write.
    pub fn claimed_by(&self, owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            last_modified: SystemTime::now(),
            ..self.clone()
        }
    }

    /// A copy with the owner cleared and the timestamp *preserved*.
    ///
    /// Relinquishing steps down without touching the record's age, so peers
    /// see the partition as available immediately rather than after a fresh
    /// expiration window.
    pub fn released(&self) -> Self {
        Self {
            owner_id: String::new(),
            ..self.clone()
        }
    }
}
