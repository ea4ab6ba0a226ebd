//! affinity-balancer: session-affinity load balancer
//!
//! Features:
//! - Consistent hashing on a request header (Call-ID by default)
//! - Liveness-aware failover by forward probing
//! - Node membership replicated across balancer instances
//! - Loose-routing route injection toward the chosen node

pub mod backends;
pub mod config;
pub mod error;
pub mod proxy;
pub mod registry;
pub mod routing;

pub use config::AppConfig;
pub use error::{BalancerError, StoreError};
pub use proxy::run_server;
