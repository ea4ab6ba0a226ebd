//! Error taxonomy for node selection and the replicated store

use axum::http::StatusCode;

/// Errors raised by the replicated store layer
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Replicated store unavailable: {0}")]
    Unavailable(String),

    #[error("Store configuration error: {0}")]
    Config(String),

    #[error("Corrupt registry entry: {0}")]
    CorruptEntry(String),
}

/// Request-scoped errors surfaced to the caller of a selection
#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error("No application servers registered")]
    NoNodesRegistered,

    #[error("All registered application servers are dead")]
    AllNodesDead,

    #[error("Request carries no '{0}' header to hash on")]
    MissingAffinityKey(String),

    #[error("Failed to construct route: {0}")]
    RouteConstruction(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BalancerError {
    /// Stable machine-readable code, distinct per failure class
    pub fn code(&self) -> &'static str {
        match self {
            BalancerError::NoNodesRegistered => "no_nodes_registered",
            BalancerError::AllNodesDead => "all_nodes_dead",
            BalancerError::MissingAffinityKey(_) => "missing_affinity_key",
            BalancerError::RouteConstruction(_) => "route_construction",
            BalancerError::Store(_) => "store_unavailable",
        }
    }

    /// HTTP status used when the error crosses the server boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            BalancerError::NoNodesRegistered | BalancerError::AllNodesDead => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            BalancerError::MissingAffinityKey(_) => StatusCode::BAD_REQUEST,
            BalancerError::RouteConstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BalancerError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_nodes_and_all_dead_are_distinct() {
        let none = BalancerError::NoNodesRegistered;
        let dead = BalancerError::AllNodesDead;
        assert_ne!(none.code(), dead.code());
        assert_ne!(none.to_string(), dead.to_string());
        assert_eq!(none.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(dead.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BalancerError::MissingAffinityKey("Call-ID".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BalancerError::RouteConstruction("bad host".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_display() {
        let err: BalancerError = StoreError::Unavailable("connection refused".to_string()).into();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.code(), "store_unavailable");
    }
}
