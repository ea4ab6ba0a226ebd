//! Request carrier and route injection

mod request;
mod route;

pub use request::{ProxyRequest, RoutableRequest};
pub use route::{inject_route, RouteDirective};
