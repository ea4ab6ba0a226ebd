//! Liveness oracle: which registered nodes are currently reachable

use parking_lot::RwLock;
use std::collections::HashSet;

use super::node::NodeDescriptor;

/// External authority on node reachability. Queried on every selection, so
/// implementations must answer from memory without blocking.
pub trait LivenessOracle: Send + Sync {
    fn is_alive(&self, node: &NodeDescriptor) -> bool;
}

impl LivenessOracle for HashSet<NodeDescriptor> {
    fn is_alive(&self, node: &NodeDescriptor) -> bool {
        self.contains(node)
    }
}

/// Host-maintained set of live nodes
#[derive(Default)]
pub struct LiveNodeSet {
    nodes: RwLock<HashSet<NodeDescriptor>>,
}

impl LiveNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the node was not already alive
    pub fn mark_alive(&self, node: NodeDescriptor) -> bool {
        self.nodes.write().insert(node)
    }

    /// Returns true if the node was alive
    pub fn mark_dead(&self, node: &NodeDescriptor) -> bool {
        self.nodes.write().remove(node)
    }

    pub fn alive_nodes(&self) -> Vec<NodeDescriptor> {
        let mut nodes: Vec<NodeDescriptor> = self.nodes.read().iter().cloned().collect();
        nodes.sort();
        nodes
    }
}

impl LivenessOracle for LiveNodeSet {
    fn is_alive(&self, node: &NodeDescriptor) -> bool {
        self.nodes.read().contains(node)
    }
}
