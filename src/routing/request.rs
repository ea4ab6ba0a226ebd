//! Request carrier abstraction

use serde::{Deserialize, Serialize};

use super::route::RouteDirective;

/// What the balancer needs from a proxied request: one named attribute to
/// read and a route list to prepend to
pub trait RoutableRequest {
    /// Value of header `name`, matched case-insensitively
    fn header(&self, name: &str) -> Option<&str>;

    /// Insert `route` ahead of any existing routes
    fn push_route_front(&mut self, route: RouteDirective);
}

/// Protocol-neutral request as exchanged on the routing endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProxyRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub routes: Vec<RouteDirective>,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl RoutableRequest for ProxyRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }

    fn push_route_front(&mut self, route: RouteDirective) {
        self.routes.insert(0, route);
    }
}
