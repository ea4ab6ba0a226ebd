//! Route directives pointing requests at a selected node

use serde::{Deserialize, Serialize};
use std::fmt;

use super::request::RoutableRequest;
use crate::backends::{NodeDescriptor, Transport};
use crate::error::BalancerError;

/// Forwarding directive for one hop
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteDirective {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub transport: Transport,
    /// Loose routing: a forwarding hint rather than a strict path constraint
    #[serde(default)]
    pub loose_routing: bool,
}

impl RouteDirective {
    pub fn new(host: impl Into<String>, port: u16, transport: Transport) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
            loose_routing: false,
        }
    }

    /// Loose-routing directive for `node`, validating its address fields
    pub fn for_node(node: &NodeDescriptor) -> Result<Self, BalancerError> {
        if node.port == 0 {
            return Err(BalancerError::RouteConstruction(format!("{}: port 0", node)));
        }

        let raw = node.host.trim();
        let bracketed;
        let input = if raw.contains(':') && !raw.starts_with('[') {
            bracketed = format!("[{}]", raw);
            bracketed.as_str()
        } else {
            raw
        };
        let host = url::Host::parse(input)
            .map_err(|e| BalancerError::RouteConstruction(format!("{}: {}", node, e)))?;

        Ok(Self {
            host: host.to_string(),
            port: node.port,
            transport: node.transport,
            loose_routing: true,
        })
    }
}

impl fmt::Display for RouteDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<sip:{}:{};transport={}", self.host, self.port, self.transport)?;
        if self.loose_routing {
            write!(f, ";lr")?;
        }
        write!(f, ">")
    }
}

/// Prepend a route to `node` on `request`.
///
/// The request is untouched when the route cannot be built.
pub fn inject_route(request: &mut dyn RoutableRequest, node: &NodeDescriptor) -> Result<RouteDirective, BalancerError> {
    let route = RouteDirective::for_node(node).inspect_err(|e| {
        tracing::error!(node = %node, error = %e, "Corrupt registry entry, cannot build route");
    })?;
    request.push_route_front(route.clone());
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::ProxyRequest;

    #[test]
    fn test_route_for_node() {
        let node = NodeDescriptor::new("as1", "10.0.0.1", 5080, Transport::Tcp);
        let route = RouteDirective::for_node(&node).unwrap();
        assert!(route.loose_routing);
        assert_eq!(route.to_string(), "<sip:10.0.0.1:5080;transport=tcp;lr>");
    }

    #[test]
    fn test_route_for_domain_and_ipv6() {
        let node = NodeDescriptor::new("", "AS1.Example.com", 5060, Transport::Udp);
        assert_eq!(RouteDirective::for_node(&node).unwrap().host, "as1.example.com");

        let node = NodeDescriptor::new("", "::1", 5060, Transport::Udp);
        assert_eq!(RouteDirective::for_node(&node).unwrap().host, "[::1]");
    }

    #[test]
    fn test_malformed_nodes_rejected() {
        for node in [
            NodeDescriptor::new("", "", 5060, Transport::Udp),
            NodeDescriptor::new("", "bad host", 5060, Transport::Udp),
            NodeDescriptor::new("", "10.0.0.1", 0, Transport::Udp),
        ] {
            let result = RouteDirective::for_node(&node);
            assert!(matches!(result, Err(BalancerError::RouteConstruction(_))), "{:?}", node);
        }
    }

    #[test]
    fn test_inject_prepends() {
        let mut request = ProxyRequest::new("INVITE", "sip:bob@example.com");
        request.routes.push(RouteDirective::new("edge.example.com", 5060, Transport::Udp));

        let node = NodeDescriptor::new("as1", "10.0.0.1", 5060, Transport::Udp);
        let route = inject_route(&mut request, &node).unwrap();

        assert_eq!(request.routes.len(), 2);
        assert_eq!(request.routes[0], route);
        assert_eq!(request.routes[1].host, "edge.example.com");
    }

    #[test]
    fn test_failed_inject_leaves_request_untouched() {
        let mut request = ProxyRequest::new("INVITE", "sip:bob@example.com");
        let node = NodeDescriptor::new("", "", 5060, Transport::Udp);
        assert!(inject_route(&mut request, &node).is_err());
        assert!(request.routes.is_empty());
    }
}
