//! wirerpc Consumer
//!
//! Everything the calling side of an RPC needs: provider selection
//! ([`LoadBalancer`]), transient-failure handling ([`RetryPolicy`] and
//! [`TolerantStrategy`]) and the pipeline that runs one call end to end
//! ([`ServiceClient`]).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use wirerpc_common::config::RpcConfig;
//! use wirerpc_common::protocol::RpcRequest;
//! use wirerpc_client::ServiceClient;
//!
//! # async fn run() -> wirerpc_common::protocol::Result<()> {
//! let config = RpcConfig::default();
//! let registry = Arc::new(wirerpc_registry::connect(&config.registry).await?);
//! let client = ServiceClient::new(config, registry)?;
//!
//! let greeting = client
//!     .call(RpcRequest::new("Greet", "hello", vec![json!("world")]))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod load_balancer;
pub mod pipeline;
pub mod retry;
pub mod tolerant;

pub use load_balancer::{
    ConsistentHashLoadBalancer, LoadBalancer, RandomLoadBalancer, RequestContext,
    RoundRobinLoadBalancer,
};
pub use pipeline::ServiceClient;
pub use retry::{FixedIntervalRetry, NoRetry, RetryPolicy};
pub use tolerant::{FailBack, FailFast, FailOver, FailSafe, TolerantStrategy};
