use std::collections::HashMap;
use std::sync::RwLock;

use crate::meta::ServiceMetaInfo;

/// Consumer-side discovery cache: service key → ordered provider list.
///
/// Not authoritative — the coordination store is. The cache is a
/// performance optimization with eventual-consistency semantics: populated
/// on a discovery miss, dropped by watch notifications, so a stale entry
/// serves at most one discovery's worth of stale data between a delete and
/// the next watch callback. Reads and writes are atomic per service key.
pub struct DiscoveryCache {
    entries: RwLock<HashMap<String, Vec<ServiceMetaInfo>>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        DiscoveryCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, service_key: &str) -> Option<Vec<ServiceMetaInfo>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(service_key)
            .cloned()
    }

    pub fn insert(&self, service_key: impl Into<String>, providers: Vec<ServiceMetaInfo>) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(service_key.into(), providers);
    }

    /// Drops one entry so the next discovery re-queries the store.
    pub fn invalidate(&self, service_key: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(service_key);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new()
    }
}
