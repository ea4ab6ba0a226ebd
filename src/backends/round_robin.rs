//! Round-robin load balancing strategy

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::balancer::{BalancerContext, LoadBalancer};
use super::node::NodeDescriptor;
use crate::error::BalancerError;
use crate::routing::{inject_route, RoutableRequest};

/// Round-robin load balancer: cycles through alive snapshot nodes in order,
/// with no session affinity
pub struct RoundRobinBalancer {
    context: BalancerContext,
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new(context: BalancerContext) -> Self {
        Self {
            context,
            counter: AtomicUsize::new(0),
        }
    }

    /// Select the next alive node
    pub fn select(&self) -> Result<NodeDescriptor, BalancerError> {
        let nodes = self.context.registry.current();
        if nodes.is_empty() {
            return Err(BalancerError::NoNodesRegistered);
        }
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        (0..nodes.len())
            .map(|offset| &nodes[start.wrapping_add(offset) % nodes.len()])
            .find(|node| self.context.liveness.is_alive(node))
            .cloned()
            .ok_or(BalancerError::AllNodesDead)
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn init(&self, initial: &[NodeDescriptor]) -> Result<(), BalancerError> {
        self.context.registry.add_all(initial)?;
        self.context.dump_nodes();
        Ok(())
    }

    fn process_request(&self, request: &mut dyn RoutableRequest) -> Result<NodeDescriptor, BalancerError> {
        let node = self.select()?;
        inject_route(request, &node)?;
        Ok(node)
    }

    fn node_added(&self, node: &NodeDescriptor) -> Result<(), BalancerError> {
        self.context.registry.add(node)?;
        Ok(())
    }

    fn node_removed(&self, node: &NodeDescriptor) -> Result<bool, BalancerError> {
        Ok(self.context.registry.remove(node)?)
    }

    fn strategy_name(&self) -> &'static str {
        "round_robin"
    }

    fn all_nodes(&self) -> Arc<Vec<NodeDescriptor>> {
        self.context.registry.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{LiveNodeSet, Transport};
    use crate::registry::{MemoryStore, NodeRegistry, RemoteChangePolicy, StoreSettings};
    use std::time::Duration;

    fn make_test_node(port: u16) -> NodeDescriptor {
        NodeDescriptor::new("", "localhost", port, Transport::Udp)
    }

    fn make_balancer(nodes: &[NodeDescriptor], liveness: Arc<LiveNodeSet>) -> RoundRobinBalancer {
        let store = MemoryStore::new(&StoreSettings::default());
        let registry = NodeRegistry::new(
            Arc::new(store.connect("lb-test").unwrap()),
            "/BALANCER/NODES",
            RemoteChangePolicy::MarkStale,
            Duration::ZERO,
        );
        let balancer = RoundRobinBalancer::new(BalancerContext::new(Arc::new(registry), liveness));
        balancer.init(nodes).unwrap();
        balancer
    }

    fn all_alive(nodes: &[NodeDescriptor]) -> Arc<LiveNodeSet> {
        let set = LiveNodeSet::new();
        for node in nodes {
            set.mark_alive(node.clone());
        }
        Arc::new(set)
    }

    #[test]
    fn test_round_robin_cycling() {
        let nodes = vec![make_test_node(8080), make_test_node(8081), make_test_node(8082)];
        let balancer = make_balancer(&nodes, all_alive(&nodes));

        assert_eq!(balancer.select().unwrap().port, 8080);
        assert_eq!(balancer.select().unwrap().port, 8081);
        assert_eq!(balancer.select().unwrap().port, 8082);
        assert_eq!(balancer.select().unwrap().port, 8080);
    }

    #[test]
    fn test_round_robin_skips_dead_nodes() {
        let nodes = vec![make_test_node(8080), make_test_node(8081)];
        let liveness = all_alive(&nodes);
        liveness.mark_dead(&nodes[0]);
        let balancer = make_balancer(&nodes, liveness);

        assert_eq!(balancer.select().unwrap().port, 8081);
        assert_eq!(balancer.select().unwrap().port, 8081);
    }

    #[test]
    fn test_round_robin_counter_wraps() {
        let nodes = vec![make_test_node(8080), make_test_node(8081), make_test_node(8082)];
        let liveness = all_alive(&nodes);
        liveness.mark_dead(&nodes[0]);
        let balancer = make_balancer(&nodes, liveness);
        balancer.counter.store(usize::MAX - 1, Ordering::Relaxed);

        for _ in 0..6 {
            assert_ne!(balancer.select().unwrap().port, 8080);
        }
    }

    #[test]
    fn test_round_robin_empty_nodes_error() {
        let balancer = make_balancer(&[], Arc::new(LiveNodeSet::new()));
        assert!(matches!(balancer.select(), Err(BalancerError::NoNodesRegistered)));
    }

    #[test]
    fn test_round_robin_all_dead() {
        let nodes = vec![make_test_node(8080)];
        let balancer = make_balancer(&nodes, Arc::new(LiveNodeSet::new()));
        assert!(matches!(balancer.select(), Err(BalancerError::AllNodesDead)));
    }

    #[test]
    fn test_strategy_name() {
        let balancer = make_balancer(&[], Arc::new(LiveNodeSet::new()));
        assert_eq!(balancer.strategy_name(), "round_robin");
    }

    #[test]
    fn test_all_nodes() {
        let nodes = vec![make_test_node(8080), make_test_node(8081)];
        let balancer = make_balancer(&nodes, all_alive(&nodes));
        assert_eq!(balancer.all_nodes().len(), 2);
    }
}
