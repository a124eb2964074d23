//! wirerpc Service Registry
//!
//! Registration with lease-based liveness, cached discovery and change
//! notification, written against an abstract coordination-store contract
//! (key/value with prefix query, per-key watch and a lease/TTL primitive)
//! so etcd-class and ZooKeeper-class backends are interchangeable.
//!
//! # Components
//!
//! - [`ServiceMetaInfo`] — the registration record; its service key and
//!   service node key are always recomputed from the fields
//! - [`CoordinationStore`] — the backend contract
//! - [`EtcdStore`] / [`MemoryStore`] — shipped backends
//! - [`StoreRegistry`] — the registry client: register, unregister,
//!   discovery with cache and watches, heartbeat renewal, destroy

pub mod cache;
pub mod etcd;
pub mod memory;
pub mod meta;
pub mod registry;
pub mod store;

pub use cache::DiscoveryCache;
pub use etcd::EtcdStore;
pub use memory::MemoryStore;
pub use meta::ServiceMetaInfo;
pub use registry::{connect, Registry, StoreRegistry, HEARTBEAT_INTERVAL, LEASE_TTL, ROOT_PATH};
pub use store::{CoordinationStore, StoreEvent, StoreEventKind};

/// Registry kind keys used in configuration.
pub mod kinds {
    pub const ETCD: &str = "etcd";
    pub const MEMORY: &str = "memory";
}
