//! Replicated node registry

mod node_registry;
mod store;

pub use node_registry::{NodeRegistry, RemoteChangePolicy};
pub use store::{EntryChange, MemoryStore, MemoryStoreHandle, ReplicatedStore, StoreEvent, StoreSettings};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{BalancerConfig, RegistryConfig};
use crate::error::StoreError;

/// Open the backing store and build this instance's registry.
///
/// Failing to reach the store here is fatal to startup.
pub fn open_registry(
    registry: &RegistryConfig,
    balancer: &BalancerConfig,
) -> Result<(Arc<NodeRegistry>, MemoryStoreHandle), StoreError> {
    let settings = StoreSettings::load(registry.store_config.as_deref())?;
    let store = MemoryStore::new(&settings);
    let instance_id = registry.resolved_instance_id();
    let handle = store.connect(instance_id)?;

    let node_registry = NodeRegistry::new(
        Arc::new(handle.clone()),
        registry.namespace.clone(),
        balancer.remote_changes,
        Duration::from_millis(balancer.rebuild_retry_ms),
    );
    Ok((Arc::new(node_registry), handle))
}
