//! The abstract coordination-store contract.
//!
//! The registry client is written against this trait, not a specific store
//! API: any backend offering key/value storage with prefix queries, a
//! lease/TTL primitive and per-key change watches satisfies it (etcd,
//! ZooKeeper-class systems, or the in-process [`crate::MemoryStore`]).

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wirerpc_common::protocol::Result;

/// What happened to a watched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    Put,
    Delete,
}

/// A change notification for a watched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    pub kind: StoreEventKind,
}

/// Key/value store with prefix query, per-key watch and leases.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Writes a key attached to a fresh lease; the store evicts the key if
    /// the lease is not renewed (by re-putting) within `ttl`.
    async fn put_with_lease(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Removes a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns all live (key, value) pairs whose key starts with `prefix`.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Subscribes to changes of one key, delivering events on `events`
    /// until the store connection is released or the receiver is dropped.
    async fn watch(&self, key: &str, events: mpsc::UnboundedSender<StoreEvent>) -> Result<()>;
}
