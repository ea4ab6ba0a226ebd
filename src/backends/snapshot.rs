//! Locally held, deterministically ordered copy of the node registry

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::node::NodeDescriptor;
use crate::error::StoreError;

/// Full enumeration of the current membership
pub trait NodeSource {
    fn list_all(&self) -> Result<BTreeSet<NodeDescriptor>, StoreError>;
}

#[derive(Default)]
struct RebuildState {
    last_rebuilt: Option<DateTime<Utc>>,
    last_failure: Option<Instant>,
}

/// Ordered node sequence used for O(1) indexed lookup.
///
/// The sequence is immutable once published and replaced wholesale on
/// rebuild, so readers see either the old or the new sequence.
pub struct LocalSnapshot {
    nodes: ArcSwap<Vec<NodeDescriptor>>,
    stale: AtomicBool,
    rebuild: Mutex<RebuildState>,
    retry_interval: Duration,
}

impl LocalSnapshot {
    /// Create an empty snapshot, marked stale so the first use rebuilds it
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            nodes: ArcSwap::from_pointee(Vec::new()),
            stale: AtomicBool::new(true),
            rebuild: Mutex::new(RebuildState::default()),
            retry_interval,
        }
    }

    /// Rebuild from `source` unconditionally
    pub fn rebuild(&self, source: &dyn NodeSource) -> Result<usize, StoreError> {
        let mut state = self.rebuild.lock();
        self.rebuild_locked(&mut state, source)
    }

    /// Rebuild only if marked stale. Concurrent callers wait for the one
    /// rebuild in progress instead of starting their own.
    pub fn rebuild_if_stale(&self, source: &dyn NodeSource) {
        if !self.is_stale() {
            return;
        }

        let mut state = self.rebuild.lock();
        if !self.is_stale() {
            return;
        }
        if let Some(failed_at) = state.last_failure {
            if failed_at.elapsed() < self.retry_interval {
                return;
            }
        }

        if let Err(e) = self.rebuild_locked(&mut state, source) {
            tracing::warn!(
                error = %e,
                nodes = self.size(),
                "Snapshot rebuild failed, keeping last known nodes"
            );
        }
    }

    fn rebuild_locked(&self, state: &mut RebuildState, source: &dyn NodeSource) -> Result<usize, StoreError> {
        // Cleared before enumerating so an invalidation that lands while we
        // read the store is not lost.
        self.stale.store(false, Ordering::SeqCst);

        match source.list_all() {
            Ok(entries) => {
                // BTreeSet iterates in `Ord` order: the sequence depends only
                // on the entry set, never on insertion order.
                let nodes: Vec<NodeDescriptor> = entries.into_iter().collect();
                let count = nodes.len();
                self.nodes.store(Arc::new(nodes));
                state.last_rebuilt = Some(Utc::now());
                state.last_failure = None;
                tracing::debug!(nodes = count, "Snapshot rebuilt");
                Ok(count)
            }
            Err(e) => {
                self.stale.store(true, Ordering::SeqCst);
                state.last_failure = Some(Instant::now());
                Err(e)
            }
        }
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Current sequence; stays valid even if a rebuild replaces it afterwards
    pub fn load(&self) -> Arc<Vec<NodeDescriptor>> {
        self.nodes.load_full()
    }

    pub fn get(&self, index: usize) -> Option<NodeDescriptor> {
        self.nodes.load().get(index).cloned()
    }

    pub fn size(&self) -> usize {
        self.nodes.load().len()
    }

    pub fn last_rebuilt(&self) -> Option<DateTime<Utc>> {
        self.rebuild.lock().last_rebuilt
    }
}
