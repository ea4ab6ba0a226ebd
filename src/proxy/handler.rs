//! Admin and routing endpoint handlers

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::server::ProxyState;
use crate::backends::{LivenessOracle, NodeDescriptor};
use crate::error::BalancerError;
use crate::routing::ProxyRequest;

const SELECTED_NODE_HEADER: &str = "x-selected-node";

/// One snapshot entry as reported by `GET /nodes`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NodeStatus {
    pub node: NodeDescriptor,
    pub alive: bool,
}

/// Response body of `GET /nodes`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodesReport {
    pub strategy: String,
    pub instance_id: String,
    pub stale: bool,
    pub last_rebuilt: Option<DateTime<Utc>>,
    pub nodes: Vec<NodeStatus>,
}

/// Body of `POST /liveness`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessUpdate {
    pub node: NodeDescriptor,
    pub alive: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for BalancerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

pub async fn list_nodes(State(state): State<ProxyState>) -> Json<NodesReport> {
    let nodes = state.balancer.all_nodes();
    let snapshot = state.registry.snapshot();
    Json(NodesReport {
        strategy: state.balancer.strategy_name().to_string(),
        instance_id: state.registry.instance_id().to_string(),
        stale: snapshot.is_stale(),
        last_rebuilt: snapshot.last_rebuilt(),
        nodes: nodes
            .iter()
            .map(|node| NodeStatus {
                node: node.clone(),
                alive: state.liveness.is_alive(node),
            })
            .collect(),
    })
}

/// Register a node and mark it alive
pub async fn add_node(
    State(state): State<ProxyState>,
    Json(node): Json<NodeDescriptor>,
) -> Result<(StatusCode, Json<NodeDescriptor>), BalancerError> {
    state.balancer.node_added(&node)?;
    state.liveness.mark_alive(node.clone());
    Ok((StatusCode::CREATED, Json(node)))
}

/// Unregister a node, marking it dead only if it was registered
pub async fn remove_node(
    State(state): State<ProxyState>,
    Json(node): Json<NodeDescriptor>,
) -> Result<StatusCode, BalancerError> {
    if state.balancer.node_removed(&node)? {
        state.liveness.mark_dead(&node);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Flip a node's liveness without touching registry membership
pub async fn set_liveness(State(state): State<ProxyState>, Json(update): Json<LivenessUpdate>) -> StatusCode {
    if update.alive {
        state.liveness.mark_alive(update.node);
    } else {
        state.liveness.mark_dead(&update.node);
    }
    StatusCode::NO_CONTENT
}

/// Force a snapshot rebuild
pub async fn resync(State(state): State<ProxyState>) -> Result<Json<usize>, BalancerError> {
    Ok(Json(state.registry.resync()?))
}

/// Select a node for the request and return it with the route prepended
pub async fn route_request(
    State(state): State<ProxyState>,
    Json(mut request): Json<ProxyRequest>,
) -> Result<Response, BalancerError> {
    let node = state.balancer.process_request(&mut request)?;

    let mut response = Json(request).into_response();
    if let Ok(value) = HeaderValue::from_str(&node.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SELECTED_NODE_HEADER), value);
    }
    Ok(response)
}
