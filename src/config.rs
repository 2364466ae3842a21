//! Balancer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LOAD_BALANCING_INTERVAL, DEFAULT_OWNERSHIP_EXPIRATION};
use crate::error::{BalancerError, BalancerResult};

/// Configuration for one [`PartitionLoadBalancer`](crate::balancer::PartitionLoadBalancer)
/// instance.
///
/// The identity fields must stay fixed for the lifetime of the instance:
/// `owner_id` is how peers attribute ownership records to this process, and
/// the scoping tuple selects which records the instance coordinates over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Unique identifier of this process within the fleet.
    pub owner_id: String,

    /// Fully qualified namespace of the event hub host.
    pub fully_qualified_namespace: String,

    /// Name of the event hub whose partitions are balanced.
    pub event_hub_name: String,

    /// Consumer group the fleet reads as.
    pub consumer_group: String,

    /// How long an un-renewed ownership record stays valid.
    pub ownership_expiration: Duration,

    /// Suggested delay between cycles for the driver's timer.
    ///
    /// The balancer never sleeps on its own; this is carried in the config
    /// so drivers and the balancer agree on one tuning surface.
    pub load_balancing_interval: Duration,
}

impl BalancerConfig {
    /// Create a configuration with default timing values.
    pub fn new(
        owner_id: impl Into<String>,
        fully_qualified_namespace: impl Into<String>,
        event_hub_name: impl Into<String>,
        consumer_group: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            fully_qualified_namespace: fully_qualified_namespace.into(),
            event_hub_name: event_hub_name.into(),
            consumer_group: consumer_group.into(),
            ownership_expiration: DEFAULT_OWNERSHIP_EXPIRATION,
            load_balancing_interval: DEFAULT_LOAD_BALANCING_INTERVAL,
        }
    }

    /// Override the ownership expiration window.
    pub fn with_ownership_expiration(mut self, expiration: Duration) -> Self {
        self.ownership_expiration = expiration;
        self
    }

    /// Override the suggested cycle interval.
    pub fn with_load_balancing_interval(mut self, interval: Duration) -> Self {
        self.load_balancing_interval = interval;
        self
    }

    /// Validate the configuration. Called at balancer construction;
    /// failures are fatal.
    pub fn validate(&self) -> BalancerResult<()> {
        if self.owner_id.is_empty() {
            return Err(BalancerError::Config(
                "owner_id must not be empty".to_string(),
            ));
        }
        if self.fully_qualified_namespace.is_empty() {
            return Err(BalancerError::Config(
                "fully_qualified_namespace must not be empty".to_string(),
            ));
        }
        if self.event_hub_name.is_empty() {
            return Err(BalancerError::Config(
                "event_hub_name must not be empty".to_string(),
            ));
        }
        if self.consumer_group.is_empty() {
            return Err(BalancerError::Config(
                "consumer_group must not be empty".to_string(),
            ));
        }
        if self.ownership_expiration.is_zero() {
            return Err(BalancerError::Config(
                "ownership_expiration must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
