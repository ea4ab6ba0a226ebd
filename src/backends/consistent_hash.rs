//! Persistent consistent-hash strategy with liveness failover

use std::sync::Arc;

use super::balancer::{BalancerContext, LoadBalancer};
use super::hash::affinity_hash;
use super::liveness::LivenessOracle;
use super::node::NodeDescriptor;
use crate::error::BalancerError;
use crate::routing::{inject_route, RoutableRequest};

/// Pick the node for `hash` from `nodes`.
///
/// Starts at `hash mod n` and probes forward with wraparound, examining at
/// most `n` candidates, and returns the first alive one.
pub fn select_node<'a>(
    nodes: &'a [NodeDescriptor],
    hash: u64,
    liveness: &dyn LivenessOracle,
) -> Result<&'a NodeDescriptor, BalancerError> {
    let n = nodes.len();
    if n == 0 {
        return Err(BalancerError::NoNodesRegistered);
    }

    let primary = (hash % n as u64) as usize;
    (0..n)
        .map(|offset| &nodes[(primary + offset) % n])
        .find(|node| liveness.is_alive(node))
        .ok_or(BalancerError::AllNodesDead)
}

/// Routes every request sharing an affinity key to the same node while that
/// node stays alive. Membership comes from the replicated registry, so every
/// balancer instance with the same membership makes the same choice.
pub struct PersistentConsistentHashBalancer {
    context: BalancerContext,
    hash_key_header: String,
}

impl PersistentConsistentHashBalancer {
    pub fn new(context: BalancerContext, hash_key_header: impl Into<String>) -> Self {
        Self {
            context,
            hash_key_header: hash_key_header.into(),
        }
    }

    pub fn hash_key_header(&self) -> &str {
        &self.hash_key_header
    }

    /// Select the node for an affinity key
    pub fn select(&self, key: &str) -> Result<NodeDescriptor, BalancerError> {
        let nodes = self.context.registry.current();
        select_node(&nodes, affinity_hash(key), self.context.liveness.as_ref()).cloned()
    }
}

impl LoadBalancer for PersistentConsistentHashBalancer {
    fn init(&self, initial: &[NodeDescriptor]) -> Result<(), BalancerError> {
        self.context.registry.add_all(initial)?;
        tracing::info!(
            header = %self.hash_key_header,
            nodes = self.context.registry.snapshot().size(),
            "Consistent hash balancer initialized"
        );
        self.context.dump_nodes();
        Ok(())
    }

    fn process_request(&self, request: &mut dyn RoutableRequest) -> Result<NodeDescriptor, BalancerError> {
        let key = request
            .header(&self.hash_key_header)
            .ok_or_else(|| BalancerError::MissingAffinityKey(self.hash_key_header.clone()))?
            .to_string();

        let node = self.select(&key).inspect_err(|e| {
            tracing::warn!(key = %key, error = %e, "No node selected");
        })?;

        inject_route(request, &node)?;
        tracing::debug!(key = %key, node = %node, "Request routed");
        Ok(node)
    }

    fn node_added(&self, node: &NodeDescriptor) -> Result<(), BalancerError> {
        self.context.registry.add(node)?;
        self.context.dump_nodes();
        Ok(())
    }

    fn node_removed(&self, node: &NodeDescriptor) -> Result<bool, BalancerError> {
        let removed = self.context.registry.remove(node)?;
        self.context.dump_nodes();
        Ok(removed)
    }

    fn strategy_name(&self) -> &'static str {
        "persistent_consistent_hash"
    }

    fn all_nodes(&self) -> Arc<Vec<NodeDescriptor>> {
        self.context.registry.current()
    }
}
