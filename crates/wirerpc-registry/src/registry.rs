//! The registry client: registration, heartbeat renewal and cached,
//! watch-invalidated discovery on top of a [`CoordinationStore`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wirerpc_common::config::RegistryConfig;
use wirerpc_common::protocol::{Result, RpcError};

use crate::cache::DiscoveryCache;
use crate::etcd::EtcdStore;
use crate::kinds;
use crate::memory::MemoryStore;
use crate::meta::ServiceMetaInfo;
use crate::store::{CoordinationStore, StoreEvent, StoreEventKind};

/// Namespace prefix for every registry key.
pub const ROOT_PATH: &str = "/rpc/";

/// Lease attached to each registration record.
pub const LEASE_TTL: Duration = Duration::from_secs(30);

/// How often the heartbeat re-registers local nodes. Must stay well below
/// [`LEASE_TTL`] so one missed beat does not expire the lease.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Service registration and discovery.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Publishes one service instance under a TTL lease.
    async fn register(&self, meta: &ServiceMetaInfo) -> Result<()>;

    /// Removes one service instance and stops renewing it.
    async fn unregister(&self, meta: &ServiceMetaInfo) -> Result<()>;

    /// All live providers of a service key, served from cache when warm.
    async fn service_discovery(&self, service_key: &str) -> Result<Vec<ServiceMetaInfo>>;

    /// Unregisters everything this process registered and stops the
    /// background tasks. Idempotent.
    async fn destroy(&self);
}

struct Inner {
    store: Arc<dyn CoordinationStore>,
    /// Full store key → meta for nodes registered by this process; the
    /// heartbeat renews exactly these.
    local_nodes: RwLock<HashMap<String, ServiceMetaInfo>>,
    /// Node keys already watched, so repeated discoveries of the same
    /// providers do not stack duplicate watches.
    watching: Mutex<HashSet<String>>,
    cache: DiscoveryCache,
    events_tx: mpsc::UnboundedSender<StoreEvent>,
}

/// [`Registry`] backed by any [`CoordinationStore`].
///
/// Two background tasks run for the lifetime of the value: a heartbeat
/// that re-registers every local node each [`HEARTBEAT_INTERVAL`], and an
/// event loop that drops cached provider lists when a watched node key is
/// deleted (lease expiry or explicit unregister).
pub struct StoreRegistry {
    inner: Arc<Inner>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

/// Connects the store named by `config.kind` and wraps it in a
/// [`StoreRegistry`].
pub async fn connect(config: &RegistryConfig) -> Result<StoreRegistry> {
    let store: Arc<dyn CoordinationStore> = match config.kind.as_str() {
        kinds::ETCD => Arc::new(
            EtcdStore::connect(&config.address, Duration::from_millis(config.timeout_ms)).await?,
        ),
        kinds::MEMORY => Arc::new(MemoryStore::new()),
        other => {
            return Err(RpcError::UnknownStrategy(format!(
                "registry kind '{other}'"
            )))
        }
    };
    Ok(StoreRegistry::new(store))
}

impl StoreRegistry {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            store,
            local_nodes: RwLock::new(HashMap::new()),
            watching: Mutex::new(HashSet::new()),
            cache: DiscoveryCache::new(),
            events_tx,
        });

        let event_loop = tokio::spawn(run_event_loop(Arc::clone(&inner), events_rx));
        let heartbeat = tokio::spawn(run_heartbeat(Arc::clone(&inner)));

        StoreRegistry {
            inner,
            heartbeat: Mutex::new(Some(heartbeat)),
            event_loop: Mutex::new(Some(event_loop)),
        }
    }

    /// Subscribes to one node key unless already watched.
    async fn watch_node(&self, node_key: &str) {
        {
            let mut watching = self
                .inner
                .watching
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !watching.insert(node_key.to_string()) {
                return;
            }
        }

        if let Err(e) = self
            .inner
            .store
            .watch(node_key, self.inner.events_tx.clone())
            .await
        {
            warn!(key = %node_key, error = %e, "failed to watch provider key");
            self.inner
                .watching
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(node_key);
        }
    }
}

#[async_trait]
impl Registry for StoreRegistry {
    async fn register(&self, meta: &ServiceMetaInfo) -> Result<()> {
        let key = format!("{ROOT_PATH}{}", meta.service_node_key());
        let value = serde_json::to_vec(meta)?;
        self.inner.store.put_with_lease(&key, value, LEASE_TTL).await?;

        self.inner
            .local_nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), meta.clone());

        info!(key = %key, "registered service node");
        Ok(())
    }

    async fn unregister(&self, meta: &ServiceMetaInfo) -> Result<()> {
        let key = format!("{ROOT_PATH}{}", meta.service_node_key());
        self.inner
            .local_nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        self.inner.store.delete(&key).await?;

        info!(key = %key, "unregistered service node");
        Ok(())
    }

    async fn service_discovery(&self, service_key: &str) -> Result<Vec<ServiceMetaInfo>> {
        if let Some(cached) = self.inner.cache.get(service_key) {
            debug!(service = %service_key, providers = cached.len(), "discovery served from cache");
            return Ok(cached);
        }

        let prefix = format!("{ROOT_PATH}{service_key}/");
        let pairs = self.inner.store.get_prefix(&prefix).await?;

        let mut providers = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match serde_json::from_slice::<ServiceMetaInfo>(&value) {
                Ok(meta) => {
                    self.watch_node(&key).await;
                    providers.push(meta);
                }
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable registration record"),
            }
        }

        debug!(service = %service_key, providers = providers.len(), "discovery queried store");
        self.inner.cache.insert(service_key, providers.clone());
        Ok(providers)
    }

    async fn destroy(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .into_iter()
            .chain(
                self.event_loop
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .take(),
            )
            .collect();
        for handle in handles {
            handle.abort();
        }

        let keys: Vec<String> = self
            .inner
            .local_nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            if let Err(e) = self.inner.store.delete(&key).await {
                warn!(key = %key, error = %e, "failed to remove node on shutdown");
            }
        }

        self.inner.cache.clear();
        info!("registry destroyed");
    }
}

impl Drop for StoreRegistry {
    fn drop(&mut self) {
        for slot in [&self.heartbeat, &self.event_loop] {
            if let Some(handle) = slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
                handle.abort();
            }
        }
    }
}

/// Invalidates cached provider lists when a watched node key disappears.
async fn run_event_loop(inner: Arc<Inner>, mut events: mpsc::UnboundedReceiver<StoreEvent>) {
    while let Some(event) = events.recv().await {
        if event.kind != StoreEventKind::Delete {
            continue;
        }
        match service_key_of_node_key(&event.key) {
            Some(service_key) => {
                debug!(key = %event.key, service = %service_key, "provider gone, dropping cached providers");
                inner.cache.invalidate(&service_key);
            }
            None => warn!(key = %event.key, "delete event for key outside the registry namespace"),
        }
    }
}

/// Re-registers every locally-owned node each interval, refreshing its
/// lease before the TTL lapses.
async fn run_heartbeat(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;

        let nodes: Vec<(String, ServiceMetaInfo)> = inner
            .local_nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(key, meta)| (key.clone(), meta.clone()))
            .collect();

        for (key, meta) in nodes {
            let value = match serde_json::to_vec(&meta) {
                Ok(value) => value,
                Err(e) => {
                    error!(key = %key, error = %e, "cannot encode registration record");
                    continue;
                }
            };
            match inner.store.put_with_lease(&key, value, LEASE_TTL).await {
                Ok(()) => debug!(key = %key, "lease renewed"),
                Err(e) => error!(key = %key, error = %e, "lease renewal failed"),
            }
        }
    }
}

/// Derives the service key from a full node key, e.g.
/// `/rpc/Greet:1.0/10.0.0.5:9000` → `Greet:1.0`.
fn service_key_of_node_key(node_key: &str) -> Option<String> {
    let relative = node_key.strip_prefix(ROOT_PATH)?;
    let (service_key, _address) = relative.rsplit_once('/')?;
    Some(service_key.to_string())
}
