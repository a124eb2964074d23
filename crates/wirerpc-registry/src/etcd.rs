//! Etcd-backed coordination store.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, EventType, GetOptions, PutOptions};
use tokio::sync::mpsc;

use wirerpc_common::protocol::{Result, RpcError};

use crate::store::{CoordinationStore, StoreEvent, StoreEventKind};

/// [`CoordinationStore`] over an etcd cluster.
///
/// Each `put_with_lease` grants a fresh lease, so lease renewal is simply
/// re-registering the key: the previous lease lapses on its own and the
/// new one carries the record forward. The etcd client multiplexes over
/// one gRPC channel and is cheap to clone per operation.
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connects to the store endpoint with the configured establishment
    /// timeout.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let options = ConnectOptions::new()
            .with_timeout(timeout)
            .with_keep_alive(Duration::from_secs(30), Duration::from_secs(10));

        let client = Client::connect([address], Some(options))
            .await
            .map_err(|e| RpcError::StoreUnreachable(format!("failed to connect to {address}: {e}")))?;

        Ok(EtcdStore { client })
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn put_with_lease(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut client = self.client.clone();

        let lease = client
            .lease_grant(ttl.as_secs() as i64, None)
            .await
            .map_err(|e| RpcError::Registration(format!("lease grant failed: {e}")))?;

        client
            .put(key, value, Some(PutOptions::new().with_lease(lease.id())))
            .await
            .map_err(|e| RpcError::Registration(format!("put {key} failed: {e}")))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut client = self.client.clone();
        client
            .delete(key, None)
            .await
            .map_err(|e| RpcError::Registration(format!("delete {key} failed: {e}")))?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut client = self.client.clone();
        let response = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(|e| RpcError::StoreUnreachable(format!("prefix query {prefix} failed: {e}")))?;

        Ok(response
            .kvs()
            .iter()
            .map(|kv| {
                (
                    String::from_utf8_lossy(kv.key()).into_owned(),
                    kv.value().to_vec(),
                )
            })
            .collect())
    }

    async fn watch(&self, key: &str, events: mpsc::UnboundedSender<StoreEvent>) -> Result<()> {
        let mut client = self.client.clone();
        let (watcher, mut stream) = client
            .watch(key, None)
            .await
            .map_err(|e| RpcError::StoreUnreachable(format!("watch {key} failed: {e}")))?;

        tokio::spawn(async move {
            // The watcher handle must outlive the stream; dropping it
            // cancels the server-side watch.
            let _watcher = watcher;
            while let Ok(Some(response)) = stream.message().await {
                for event in response.events() {
                    let kind = match event.event_type() {
                        EventType::Put => StoreEventKind::Put,
                        EventType::Delete => StoreEventKind::Delete,
                    };
                    let Some(kv) = event.kv() else { continue };
                    let event = StoreEvent {
                        key: String::from_utf8_lossy(kv.key()).into_owned(),
                        kind,
                    };
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(())
    }
}
