//! Backend node descriptor

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Transport a backend listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Udp,
    Tcp,
    Tls,
    Ws,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => write!(f, "udp"),
            Transport::Tcp => write!(f, "tcp"),
            Transport::Tls => write!(f, "tls"),
            Transport::Ws => write!(f, "ws"),
        }
    }
}

/// Identity of a single backend application server.
///
/// Field order matters: the derived `Ord` sorts by host, then port, then
/// transport, then name, and every balancer instance relies on that order to
/// assign the same snapshot index to the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub name: String,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16, transport: Transport) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
            name: name.into(),
        }
    }

    /// Key under which the descriptor is stored in the registry namespace
    pub fn registry_key(&self) -> String {
        // Struct fields serialize in declaration order, so equal descriptors
        // always produce the same key.
        serde_json::to_string(self).unwrap_or_else(|_| format!("{}:{}", self.host, self.port))
    }

    /// Decode a descriptor from its registry key
    pub fn from_registry_key(key: &str) -> Result<Self, StoreError> {
        serde_json::from_str(key).map_err(|e| StoreError::CorruptEntry(format!("{}: {}", key, e)))
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}:{}/{}", self.host, self.port, self.transport)
        } else {
            write!(f, "{} ({}:{}/{})", self.name, self.host, self.port, self.transport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_key_roundtrip() {
        let node = NodeDescriptor::new("as1", "10.0.0.1", 5060, Transport::Tcp);
        let decoded = NodeDescriptor::from_registry_key(&node.registry_key()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_registry_key_is_identity() {
        let a = NodeDescriptor::new("as1", "10.0.0.1", 5060, Transport::Udp);
        let b = NodeDescriptor::new("as1", "10.0.0.1", 5060, Transport::Udp);
        assert_eq!(a.registry_key(), b.registry_key());

        let c = NodeDescriptor::new("as1", "10.0.0.1", 5061, Transport::Udp);
        assert_ne!(a.registry_key(), c.registry_key());
    }

    #[test]
    fn test_corrupt_key() {
        let result = NodeDescriptor::from_registry_key("not-json");
        assert!(matches!(result, Err(StoreError::CorruptEntry(_))));
    }

    #[test]
    fn test_ordering_by_host_then_port() {
        let mut nodes = vec![
            NodeDescriptor::new("c", "10.0.0.2", 5060, Transport::Udp),
            NodeDescriptor::new("b", "10.0.0.1", 5070, Transport::Udp),
            NodeDescriptor::new("a", "10.0.0.1", 5060, Transport::Udp),
        ];
        nodes.sort();
        let ports: Vec<(&str, u16)> = nodes.iter().map(|n| (n.host.as_str(), n.port)).collect();
        assert_eq!(ports, vec![("10.0.0.1", 5060), ("10.0.0.1", 5070), ("10.0.0.2", 5060)]);
    }

    #[test]
    fn test_transport_defaults_to_udp() {
        let node: NodeDescriptor = serde_json::from_str(r#"{"host":"h","port":5060}"#).unwrap();
        assert_eq!(node.transport, Transport::Udp);
        assert!(node.name.is_empty());
        assert_eq!(node.to_string(), "h:5060/udp");
    }
}
