//! Registry of exportable targets and their exclusive-export locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

/// Maps target ids to per-target locks. Exports of one target serialize;
/// different targets proceed independently.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target. Re-registering keeps the existing lock.
    pub fn register(&self, id: impl Into<String>) {
        self.guard().entry(id.into()).or_default();
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.guard().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.guard().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// The lock for `id`, if registered.
    pub fn lock_for(&self, id: &str) -> Option<Arc<AsyncMutex<()>>> {
        self.guard().get(id).cloned()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.targets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
