//! Balancer algorithm trait

use std::sync::Arc;

use super::liveness::LivenessOracle;
use super::node::NodeDescriptor;
use crate::error::BalancerError;
use crate::registry::NodeRegistry;
use crate::routing::RoutableRequest;

/// Collaborators every algorithm selects against
#[derive(Clone)]
pub struct BalancerContext {
    pub registry: Arc<NodeRegistry>,
    pub liveness: Arc<dyn LivenessOracle>,
}

impl BalancerContext {
    pub fn new(registry: Arc<NodeRegistry>, liveness: Arc<dyn LivenessOracle>) -> Self {
        Self { registry, liveness }
    }

    /// Log every snapshot entry with its liveness
    pub fn dump_nodes(&self) {
        let nodes = self.registry.snapshot().load();
        tracing::info!(count = nodes.len(), "Nodes in registry snapshot");
        for node in nodes.iter() {
            tracing::info!(node = %node, alive = self.liveness.is_alive(node), "Registry node");
        }
    }
}

/// Pluggable routing policy for inbound requests
pub trait LoadBalancer: Send + Sync {
    /// Prepare the algorithm, registering the initial members
    fn init(&self, initial: &[NodeDescriptor]) -> Result<(), BalancerError>;

    /// Choose a node for `request` and inject a route to it
    fn process_request(&self, request: &mut dyn RoutableRequest) -> Result<NodeDescriptor, BalancerError>;

    /// A backend joined the cluster
    fn node_added(&self, node: &NodeDescriptor) -> Result<(), BalancerError>;

    /// A backend left the cluster
    fn node_removed(&self, node: &NodeDescriptor) -> Result<bool, BalancerError>;

    /// Return the strategy name (for logging)
    fn strategy_name(&self) -> &'static str;

    /// Return all nodes in the current snapshot (for logging/CLI display)
    fn all_nodes(&self) -> Arc<Vec<NodeDescriptor>>;
}
