//! Replicated key-value store interface and an in-process implementation

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::StoreError;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Kind of entry-level modification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryChange {
    Put,
    Remove,
}

/// Notifications published by the replicated store.
///
/// Entry modifications and cluster view changes are separate variants:
/// a view change says which balancer instances share the store and never
/// carries node membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    EntryModified {
        namespace: String,
        key: String,
        change: EntryChange,
        /// Instance id of the writer
        origin: String,
    },
    ViewChanged {
        members: BTreeSet<String>,
    },
}

/// Narrow contract this crate needs from a replicated store
pub trait ReplicatedStore: Send + Sync {
    /// Store `key` under `namespace`. Storing an existing key is a no-op.
    fn put(&self, namespace: &str, key: &str) -> Result<(), StoreError>;

    /// Remove `key`, returning whether it was present
    fn remove(&self, namespace: &str, key: &str) -> Result<bool, StoreError>;

    /// Enumerate every key under `namespace` from the local replica
    fn keys(&self, namespace: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Subscribe to entry and view notifications
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Identity of this instance as seen by the store
    fn instance_id(&self) -> &str;
}

/// Settings read from the optional store configuration file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StoreSettings {
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
    /// Instance ids expected in the initial cluster view
    #[serde(default)]
    pub replicas: Vec<String>,
}

fn default_cluster_name() -> String {
    "affinity-balancer".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            replicas: Vec::new(),
        }
    }
}

impl StoreSettings {
    /// Load settings from `path`, or fall back to defaults when no path is configured.
    ///
    /// A configured path that cannot be read means the store cannot start.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let Some(path) = path else {
            tracing::info!("Using default store settings");
            return Ok(Self::default());
        };

        tracing::info!("Using store configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))
    }
}

struct SharedState {
    cluster_name: String,
    namespaces: RwLock<HashMap<String, BTreeSet<String>>>,
    members: RwLock<BTreeSet<String>>,
    available: AtomicBool,
    events: broadcast::Sender<StoreEvent>,
}

/// In-process replicated store.
///
/// Every handle obtained through [`MemoryStore::connect`] sees the same
/// entries and the same notification stream, the way several balancer
/// instances see one replicated cluster.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<SharedState>,
}

impl MemoryStore {
    pub fn new(settings: &StoreSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(SharedState {
                cluster_name: settings.cluster_name.clone(),
                namespaces: RwLock::new(HashMap::new()),
                members: RwLock::new(settings.replicas.iter().cloned().collect()),
                available: AtomicBool::new(true),
                events,
            }),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.shared.cluster_name
    }

    /// Join the cluster as `instance_id`, publishing a view change
    pub fn connect(&self, instance_id: impl Into<String>) -> Result<MemoryStoreHandle, StoreError> {
        let instance_id = instance_id.into();
        self.check_available()?;
        let members = {
            let mut members = self.shared.members.write();
            members.insert(instance_id.clone());
            members.clone()
        };
        tracing::info!(
            cluster = %self.shared.cluster_name,
            instance = %instance_id,
            "Joined replicated store"
        );
        self.publish(StoreEvent::ViewChanged { members });
        Ok(MemoryStoreHandle {
            store: self.clone(),
            instance_id,
        })
    }

    /// Simulate loss or recovery of the store
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    pub fn members(&self) -> BTreeSet<String> {
        self.shared.members.read().clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.shared.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "cluster '{}' is not reachable",
                self.shared.cluster_name
            )))
        }
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine; nobody is listening yet.
        let _ = self.shared.events.send(event);
    }
}

/// One instance's connection to a [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryStoreHandle {
    store: MemoryStore,
    instance_id: String,
}

impl MemoryStoreHandle {
    /// Leave the cluster, publishing a view change
    pub fn leave(&self) {
        let members = {
            let mut members = self.store.shared.members.write();
            members.remove(&self.instance_id);
            members.clone()
        };
        self.store.publish(StoreEvent::ViewChanged { members });
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl ReplicatedStore for MemoryStoreHandle {
    fn put(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.store.check_available()?;
        let inserted = self
            .store
            .shared
            .namespaces
            .write()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string());
        if inserted {
            self.store.publish(StoreEvent::EntryModified {
                namespace: namespace.to_string(),
                key: key.to_string(),
                change: EntryChange::Put,
                origin: self.instance_id.clone(),
            });
        }
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool, StoreError> {
        self.store.check_available()?;
        let removed = self
            .store
            .shared
            .namespaces
            .write()
            .get_mut(namespace)
            .map(|keys| keys.remove(key))
            .unwrap_or(false);
        if removed {
            self.store.publish(StoreEvent::EntryModified {
                namespace: namespace.to_string(),
                key: key.to_string(),
                change: EntryChange::Remove,
                origin: self.instance_id.clone(),
            });
        }
        Ok(removed)
    }

    fn keys(&self, namespace: &str) -> Result<BTreeSet<String>, StoreError> {
        self.store.check_available()?;
        Ok(self
            .store
            .shared
            .namespaces
            .read()
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.shared.events.subscribe()
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}
