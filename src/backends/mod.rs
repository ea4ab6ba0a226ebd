//! Backend selection

mod balancer;
mod consistent_hash;
pub mod hash;
mod liveness;
mod node;
mod round_robin;
mod snapshot;

pub use balancer::{BalancerContext, LoadBalancer};
pub use consistent_hash::{select_node, PersistentConsistentHashBalancer};
pub use liveness::{LiveNodeSet, LivenessOracle};
pub use node::{NodeDescriptor, Transport};
pub use round_robin::RoundRobinBalancer;
pub use snapshot::{LocalSnapshot, NodeSource};

use std::sync::Arc;

use crate::config::BalancerConfig;

/// Build a load balancer from configuration and its collaborators
pub fn build_balancer(
    config: &BalancerConfig,
    context: BalancerContext,
) -> Result<Arc<dyn LoadBalancer>, Box<dyn std::error::Error>> {
    match config.algorithm.as_str() {
        "persistent_consistent_hash" => Ok(Arc::new(PersistentConsistentHashBalancer::new(
            context,
            config.hash_key_header.clone(),
        ))),
        "round_robin" => Ok(Arc::new(RoundRobinBalancer::new(context))),
        other => Err(format!(
            "Unknown load balancer strategy: '{}'. Supported: persistent_consistent_hash, round_robin",
            other
        )
        .into()),
    }
}
