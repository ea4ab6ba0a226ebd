//! Balancer HTTP server

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handler;
use crate::backends::{build_balancer, BalancerContext, LiveNodeSet, LoadBalancer};
use crate::config::AppConfig;
use crate::registry::{open_registry, MemoryStoreHandle, NodeRegistry};

/// Shared state for the balancer
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub balancer: Arc<dyn LoadBalancer>,
    pub registry: Arc<NodeRegistry>,
    pub liveness: Arc<LiveNodeSet>,
}

/// Open the registry, build the configured algorithm and register the
/// initial nodes. A store that cannot be reached aborts startup.
pub fn build_state(config: AppConfig) -> Result<(ProxyState, MemoryStoreHandle), Box<dyn std::error::Error>> {
    let (registry, store) = open_registry(&config.registry, &config.balancer)?;

    // Statically configured nodes start out alive; the host updates
    // liveness afterwards through the admin API.
    let liveness = Arc::new(LiveNodeSet::new());
    for node in &config.nodes {
        liveness.mark_alive(node.clone());
    }

    let context = BalancerContext::new(Arc::clone(&registry), liveness.clone());
    let balancer = build_balancer(&config.balancer, context)?;
    balancer.init(&config.nodes)?;

    tracing::info!(
        strategy = balancer.strategy_name(),
        instance = %registry.instance_id(),
        namespace = %registry.namespace(),
        "Balancer initialized"
    );

    let state = ProxyState {
        config: Arc::new(config),
        balancer,
        registry,
        liveness,
    };
    Ok((state, store))
}

/// Build the router serving the admin and routing endpoints
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(handler::health))
        .route(
            "/nodes",
            get(handler::list_nodes)
                .post(handler::add_node)
                .delete(handler::remove_node),
        )
        .route("/liveness", post(handler::set_liveness))
        .route("/resync", post(handler::resync))
        .route("/route", post(handler::route_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the balancer server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let (state, store) = build_state(config)?;

    let listener_task = Arc::clone(&state.registry).spawn_listener();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("affinity-balancer listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.leave();
    listener_task.abort();
    tracing::info!("affinity-balancer stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{NodeDescriptor, Transport};
    use crate::config::{BalancerConfig, RegistryConfig, ServerConfig};

    fn config(nodes: Vec<NodeDescriptor>) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
            },
            balancer: BalancerConfig::default(),
            registry: RegistryConfig::default(),
            nodes,
        }
    }

    #[test]
    fn test_build_state_registers_initial_nodes() {
        let nodes = vec![
            NodeDescriptor::new("as2", "10.0.0.2", 5060, Transport::Udp),
            NodeDescriptor::new("as1", "10.0.0.1", 5060, Transport::Udp),
        ];
        let (state, _store) = build_state(config(nodes.clone())).unwrap();

        assert_eq!(state.balancer.all_nodes().len(), 2);
        assert_eq!(state.balancer.all_nodes()[0].name, "as1");
        assert_eq!(state.liveness.alive_nodes().len(), 2);
    }

    #[test]
    fn test_build_state_fails_without_store() {
        let mut config = config(Vec::new());
        config.registry.store_config = Some("/nonexistent/store.yaml".into());
        assert!(build_state(config).is_err());
    }

    #[test]
    fn test_build_state_rejects_unknown_algorithm() {
        let mut config = config(Vec::new());
        config.balancer.algorithm = "least_connections".to_string();
        assert!(build_state(config).is_err());
    }
}
