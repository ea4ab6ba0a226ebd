//! Replicated registry of backend nodes

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::store::{ReplicatedStore, StoreEvent};
use crate::backends::{LocalSnapshot, NodeDescriptor, NodeSource};
use crate::error::StoreError;

/// What to do when another instance modifies the node namespace
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteChangePolicy {
    /// Mark the local snapshot stale; the next selection rebuilds it
    #[default]
    MarkStale,
    /// Only log the change; the snapshot catches up at the next local
    /// add/remove or explicit resync
    Observe,
}

/// Node membership shared by all balancer instances through a replicated
/// store, plus this instance's local snapshot of it
pub struct NodeRegistry {
    store: Arc<dyn ReplicatedStore>,
    namespace: String,
    snapshot: LocalSnapshot,
    remote_changes: RemoteChangePolicy,
}

impl NodeRegistry {
    pub fn new(
        store: Arc<dyn ReplicatedStore>,
        namespace: impl Into<String>,
        remote_changes: RemoteChangePolicy,
        rebuild_retry: Duration,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            snapshot: LocalSnapshot::new(rebuild_retry),
            remote_changes,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn instance_id(&self) -> &str {
        self.store.instance_id()
    }

    pub fn snapshot(&self) -> &LocalSnapshot {
        &self.snapshot
    }

    /// Store `node` and rebuild the local snapshot before returning
    pub fn add(&self, node: &NodeDescriptor) -> Result<(), StoreError> {
        self.store.put(&self.namespace, &node.registry_key())?;
        tracing::info!(node = %node, "Node added to registry");
        self.resync_after_write();
        Ok(())
    }

    /// Store several nodes with a single snapshot rebuild at the end
    pub fn add_all(&self, nodes: &[NodeDescriptor]) -> Result<(), StoreError> {
        for node in nodes {
            self.store.put(&self.namespace, &node.registry_key())?;
            tracing::info!(node = %node, "Node added to registry");
        }
        self.resync_after_write();
        Ok(())
    }

    /// Remove `node` and rebuild the local snapshot before returning
    pub fn remove(&self, node: &NodeDescriptor) -> Result<bool, StoreError> {
        let removed = self.store.remove(&self.namespace, &node.registry_key())?;
        if removed {
            tracing::info!(node = %node, "Node removed from registry");
        } else {
            tracing::debug!(node = %node, "Node was not registered");
        }
        self.resync_after_write();
        Ok(removed)
    }

    /// Force a snapshot rebuild
    pub fn resync(&self) -> Result<usize, StoreError> {
        self.snapshot.rebuild(self)
    }

    /// Current node sequence, rebuilt first if stale
    pub fn current(&self) -> Arc<Vec<NodeDescriptor>> {
        self.snapshot.rebuild_if_stale(self);
        self.snapshot.load()
    }

    fn resync_after_write(&self) {
        if let Err(e) = self.resync() {
            tracing::warn!(error = %e, "Snapshot rebuild after registry write failed");
        }
    }

    /// Apply one store notification to the local snapshot
    pub fn handle_event(&self, event: &StoreEvent) {
        match event {
            StoreEvent::EntryModified {
                namespace,
                key,
                change,
                origin,
            } => {
                if namespace != &self.namespace {
                    tracing::trace!(namespace = %namespace, "Ignoring change outside node namespace");
                    return;
                }
                let local = origin == self.store.instance_id();
                tracing::debug!(
                    key = %key,
                    change = ?change,
                    origin = %origin,
                    local,
                    "Registry entry modified"
                );
                // Local writes already rebuilt synchronously
                if !local && self.remote_changes == RemoteChangePolicy::MarkStale {
                    self.snapshot.mark_stale();
                }
            }
            StoreEvent::ViewChanged { members } => {
                tracing::info!(members = ?members, "Balancer cluster view changed");
            }
        }
    }

    /// Consume store notifications on a background task
    pub fn spawn_listener(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.handle_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Registry listener lagged, marking snapshot stale");
                        self.snapshot.mark_stale();
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Store notification stream closed");
                        break;
                    }
                }
            }
        })
    }
}

impl NodeSource for NodeRegistry {
    fn list_all(&self) -> Result<BTreeSet<NodeDescriptor>, StoreError> {
        let keys = self.store.keys(&self.namespace)?;
        let mut nodes = BTreeSet::new();
        for key in keys {
            match NodeDescriptor::from_registry_key(&key) {
                Ok(node) => {
                    nodes.insert(node);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable registry entry");
                }
            }
        }
        Ok(nodes)
    }
}
