//! In-process coordination store.
//!
//! A second implementation of the [`CoordinationStore`] contract next to
//! the etcd backend. It keeps leases as expiry deadlines and evicts expired
//! keys lazily on read, which is enough to exercise the full registry
//! client (registration, renewal, watch-driven cache invalidation) in
//! tests and single-process deployments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use wirerpc_common::protocol::Result;

use crate::store::{CoordinationStore, StoreEvent, StoreEventKind};

struct MemoryInner {
    entries: HashMap<String, (Vec<u8>, Instant)>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<StoreEvent>>>,
}

impl MemoryInner {
    fn notify(&mut self, key: &str, kind: StoreEventKind) {
        if let Some(senders) = self.watchers.get_mut(key) {
            senders.retain(|tx| {
                tx.send(StoreEvent {
                    key: key.to_string(),
                    kind,
                })
                .is_ok()
            });
        }
    }

    /// Removes expired entries, firing Delete events like a store-side
    /// lease eviction would.
    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.notify(&key, StoreEventKind::Delete);
        }
    }
}

/// In-memory [`CoordinationStore`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(Mutex::new(MemoryInner {
                entries: HashMap::new(),
                watchers: HashMap::new(),
            })),
        }
    }

    /// Whether a key currently exists and its lease has not expired.
    pub fn contains(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.purge_expired(Instant::now());
        inner.entries.contains_key(key)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn put_with_lease(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        inner.notify(key, StoreEventKind::Put);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.remove(key).is_some() {
            inner.notify(key, StoreEventKind::Delete);
        }
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.purge_expired(Instant::now());

        let mut matches: Vec<(String, Vec<u8>)> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (value, _))| (key.clone(), value.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches)
    }

    async fn watch(&self, key: &str, events: mpsc::UnboundedSender<StoreEvent>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.watchers.entry(key.to_string()).or_default().push(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStore::new();
        store
            .put_with_lease("/rpc/A:1.0/h:1", b"a".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        store
            .put_with_lease("/rpc/A:1.0/h:2", b"b".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        store
            .put_with_lease("/rpc/B:1.0/h:3", b"c".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        let matches = store.get_prefix("/rpc/A:1.0/").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].0, "/rpc/A:1.0/h:1");

        store.delete("/rpc/A:1.0/h:1").await.unwrap();
        assert_eq!(store.get_prefix("/rpc/A:1.0/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn watch_delivers_delete_events() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.watch("/rpc/A:1.0/h:1", tx).await.unwrap();

        store
            .put_with_lease("/rpc/A:1.0/h:1", b"a".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        store.delete("/rpc/A:1.0/h:1").await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap().kind,
            StoreEventKind::Put
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, StoreEventKind::Delete);
        assert_eq!(event.key, "/rpc/A:1.0/h:1");
    }

    #[tokio::test(start_paused = true)]
    async fn leases_expire_without_renewal() {
        let store = MemoryStore::new();
        store
            .put_with_lease("/rpc/A:1.0/h:1", b"a".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(store.contains("/rpc/A:1.0/h:1"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.contains("/rpc/A:1.0/h:1"));
        assert!(store.get_prefix("/rpc/A:1.0/").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_extends_the_lease() {
        let store = MemoryStore::new();
        store
            .put_with_lease("/rpc/A:1.0/h:1", b"a".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        store
            .put_with_lease("/rpc/A:1.0/h:1", b"a".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(store.contains("/rpc/A:1.0/h:1"));
    }
}
