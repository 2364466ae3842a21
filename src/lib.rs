//! # Hubbub
//! Cooperative partition load balancing for event hub consumer fleets.
//!
//! A fleet of consumer processes shares a fixed set of event hub partitions
//! without any central coordinator. Each process runs an identical
//! [`PartitionLoadBalancer`](balancer::PartitionLoadBalancer); the instances
//! communicate only through a shared [`OwnershipStore`](store::OwnershipStore)
//! whose records carry an optimistic-concurrency version token. On every
//! cycle an instance renews its own holdings, classifies the fleet-wide
//! ownership state, and claims at most one partition: an orphan if one
//! exists, otherwise a steal from an over-provisioned peer. Over successive
//! cycles the fleet converges so that every instance holds its fair share.
//!
//! # Goals
//! - No central coordinator: the ownership store is the only shared state
//! - Crash recovery through ownership expiration, not failure detection
//! - Bounded write traffic: one renewal batch plus at most one claim per cycle
//! - Pluggable store backends behind a two-operation trait
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hubbub::balancer::PartitionLoadBalancer;
//! use hubbub::config::BalancerConfig;
//! use hubbub::memory::InMemoryOwnershipStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryOwnershipStore::new());
//!     let config = BalancerConfig::new(
//!         "consumer-1",
//!         "my-namespace.servicebus.example.net",
//!         "telemetry",
//!         "$default",
//!     );
//!     let mut balancer = PartitionLoadBalancer::new(store, config)?;
//!
//!     let partitions: Vec<String> = (0..8).map(|p| p.to_string()).collect();
//!     let cancel = CancellationToken::new();
//!
//!     loop {
//!         if let Some(claimed) = balancer
//!             .run_load_balancing_cycle(&partitions, &cancel)
//!             .await?
//!         {
//!             // hand the newly claimed partition to an event reader
//!             println!("claimed partition {}", claimed.partition_id);
//!         }
//!         tokio::time::sleep(balancer.config().load_balancing_interval).await;
//!     }
//! }
//! ```
//!
//! The driver owns the cycle cadence, cancellation, and dispatching claimed
//! partitions to readers; the balancer is agnostic to all three.

#![forbid(unsafe_code)]

pub mod balancer;
pub mod config;
pub mod constants;
pub mod distribution;
pub mod error;
pub mod memory;
pub mod ownership;
pub mod store;
pub mod telemetry;

pub mod prelude {
    //! Convenience re-exports of the main balancer surface.
    pub use crate::balancer::PartitionLoadBalancer;
    pub use crate::config::BalancerConfig;
    pub use crate::distribution::OwnershipDistribution;
    pub use crate::error::{BalancerError, BalancerResult};
    pub use crate::memory::InMemoryOwnershipStore;
    pub use crate::ownership::PartitionOwnership;
    pub use crate::store::{OwnershipStore, StoreError, StoreResult};

    pub use tokio_util::sync::CancellationToken;
}
