mod loader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use loader::load_config;

use crate::backends::NodeDescriptor;
use crate::registry::RemoteChangePolicy;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub balancer: BalancerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Backends registered at startup
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
}

/// Balancer server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Node selection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalancerConfig {
    /// Strategy name: "persistent_consistent_hash" or "round_robin"
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Request header whose value is hashed for affinity
    #[serde(default = "default_hash_key_header")]
    pub hash_key_header: String,
    /// Reaction to node changes written by other balancer instances
    #[serde(default)]
    pub remote_changes: RemoteChangePolicy,
    /// Minimum delay between snapshot rebuild attempts after a store failure
    #[serde(default = "default_rebuild_retry_ms")]
    pub rebuild_retry_ms: u64,
}

fn default_algorithm() -> String {
    "persistent_consistent_hash".to_string()
}

fn default_hash_key_header() -> String {
    "Call-ID".to_string()
}

fn default_rebuild_retry_ms() -> u64 {
    1000
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            hash_key_header: default_hash_key_header(),
            remote_changes: RemoteChangePolicy::default(),
            rebuild_retry_ms: default_rebuild_retry_ms(),
        }
    }
}

/// Replicated registry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Namespace holding node entries in the replicated store
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Optional store configuration file; defaults apply when absent
    #[serde(default)]
    pub store_config: Option<PathBuf>,
    /// Identity of this balancer instance in the store cluster
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_namespace() -> String {
    "/BALANCER/NODES".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            store_config: None,
            instance_id: None,
        }
    }
}

impl RegistryConfig {
    /// Configured instance id, or a freshly generated one
    pub fn resolved_instance_id(&self) -> String {
        self.instance_id
            .clone()
            .unwrap_or_else(|| format!("balancer-{}", uuid::Uuid::new_v4()))
    }
}

const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config.yaml", "config.yml", "config/config.yaml"];

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Load configuration with fallback to default path
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => Self::search_in(Path::new(".")),
        }
    }

    /// Load the first default config file found under `dir`
    fn search_in(dir: &Path) -> Result<Self, ConfigError> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(|p| dir.join(p))
            .find(|path| path.exists())
            .map(Self::from_file)
            .unwrap_or_else(|| {
                Err(ConfigError::NotFound(format!(
                    "No config file found. Tried: {}",
                    DEFAULT_CONFIG_PATHS.join(", ")
                )))
            })
    }

    /// Reject configurations the balancer cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.balancer.hash_key_header.trim().is_empty() {
            return Err(ConfigError::Validation("balancer.hash_key_header must not be empty".to_string()));
        }
        if self.registry.namespace.trim().is_empty() {
            return Err(ConfigError::Validation("registry.namespace must not be empty".to_string()));
        }
        if let Some(node) = self.nodes.iter().find(|n| n.host.trim().is_empty() || n.port == 0) {
            return Err(ConfigError::Validation(format!("invalid node address: {}", node)));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
