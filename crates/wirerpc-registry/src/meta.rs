use serde::{Deserialize, Serialize};

use wirerpc_common::protocol::DEFAULT_SERVICE_VERSION;

/// Metadata for one service instance.
///
/// Constructed by a provider at startup, published to the coordination
/// store on register, refreshed by heartbeat, removed on unregister or
/// lease expiry. Consumer-side values are read-only copies reconstructed
/// from store data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceMetaInfo {
    pub service_name: String,
    pub service_version: String,
    pub service_host: String,
    pub service_port: u16,
    /// Service group. Carried in registration records; multi-group routing
    /// is not implemented.
    pub service_group: String,
}

impl Default for ServiceMetaInfo {
    fn default() -> Self {
        ServiceMetaInfo {
            service_name: String::new(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
            service_host: String::new(),
            service_port: 0,
            service_group: "default".to_string(),
        }
    }
}

impl ServiceMetaInfo {
    pub fn new(service_name: impl Into<String>, service_host: impl Into<String>, service_port: u16) -> Self {
        ServiceMetaInfo {
            service_name: service_name.into(),
            service_host: service_host.into(),
            service_port,
            ..ServiceMetaInfo::default()
        }
    }

    /// Logical identity of the service version, shared by all instances.
    /// A pure function of the fields — never stored, never out of sync.
    pub fn service_key(&self) -> String {
        format!("{}:{}", self.service_name, self.service_version)
    }

    /// Identity of this one instance: service key plus network address.
    pub fn service_node_key(&self) -> String {
        format!("{}/{}:{}", self.service_key(), self.service_host, self.service_port)
    }

    /// The instance's dialable address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.service_host, self.service_port)
    }
}
