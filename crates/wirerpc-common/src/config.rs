//! Framework configuration.
//!
//! Configuration is an explicit value created once at startup and passed by
//! handle to every component that needs it; there is no process-wide
//! singleton or lazy global lookup. Every pluggable strategy is named by a
//! string key resolved through an explicit registry at construction time.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a wirerpc process (provider or consumer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Host the provider publishes in its registration records.
    pub server_host: String,
    /// Port the provider listens on and publishes.
    pub server_port: u16,
    /// Serializer key, e.g. "json".
    pub serializer: String,
    /// Load balancer key: "round_robin", "random" or "consistent_hash".
    pub load_balancer: String,
    /// Retry policy key: "none" or "fixed_interval".
    pub retry_policy: String,
    /// Fault-tolerance key: "fail_fast", "fail_safe", "fail_over" or
    /// "fail_back".
    pub tolerant_strategy: String,
    /// Mock mode: the call pipeline returns type-appropriate zero values
    /// without touching the network. Useful for contract testing without a
    /// live provider.
    pub mock: bool,
    pub registry: RegistryConfig,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            name: "wirerpc".to_string(),
            version: "1.0".to_string(),
            server_host: "localhost".to_string(),
            server_port: 8080,
            serializer: "json".to_string(),
            load_balancer: "round_robin".to_string(),
            retry_policy: "none".to_string(),
            tolerant_strategy: "fail_fast".to_string(),
            mock: false,
            registry: RegistryConfig::default(),
        }
    }
}

/// Coordination-store connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Store kind key: "etcd" or "memory".
    pub kind: String,
    /// Store endpoint, e.g. "http://localhost:2380".
    pub address: String,
    /// Connection establishment timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            kind: "etcd".to_string(),
            address: "http://localhost:2380".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RpcConfig::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.serializer, "json");
        assert_eq!(config.load_balancer, "round_robin");
        assert_eq!(config.retry_policy, "none");
        assert_eq!(config.tolerant_strategy, "fail_fast");
        assert!(!config.mock);
        assert_eq!(config.registry.kind, "etcd");
        assert_eq!(config.registry.timeout_ms, 10_000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: RpcConfig =
            serde_json::from_str(r#"{"server_port": 9000, "registry": {"kind": "memory"}}"#)
                .unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.registry.kind, "memory");
        assert_eq!(config.serializer, "json");
    }
}
