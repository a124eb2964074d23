//! wirerpc Provider
//!
//! The serving side of an RPC: a dispatch table built at registration
//! time ([`Dispatcher`]), a TCP server speaking the wire protocol
//! ([`RpcServer`]) and a bootstrap that registers, serves and renews in
//! one call ([`Provider`]).
//!
//! # Example
//!
//! ```no_run
//! use serde_json::{json, Value};
//! use wirerpc_common::config::RpcConfig;
//! use wirerpc_server::{Provider, ServiceHandler};
//!
//! # async fn run() -> wirerpc_common::protocol::Result<()> {
//! let greet = ServiceHandler::new("Greet").method("hello", &["string"], |args: &[Value]| {
//!     let name = args[0].as_str().unwrap_or_default();
//!     Ok(json!(format!("hello {name}")))
//! });
//!
//! let provider = Provider::start(&RpcConfig::default(), vec![greet]).await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod dispatcher;
pub mod server;

pub use bootstrap::Provider;
pub use dispatcher::{Dispatcher, Handler, ServiceHandler};
pub use server::RpcServer;
