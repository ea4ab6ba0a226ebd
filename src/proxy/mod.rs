//! HTTP surface of the balancer

mod handler;
pub mod server;

pub use handler::{LivenessUpdate, NodeStatus, NodesReport};
pub use server::{build_router, build_state, run_server, ProxyState};
