//! Provider bootstrap.
//!
//! Wires the pieces a provider process needs: connect the registry,
//! publish every service under the actual bound address, start serving.
//! Port 0 is honored the usual way, with the kernel-assigned port
//! published in the registration records.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use wirerpc_common::config::RpcConfig;
use wirerpc_common::protocol::Result;
use wirerpc_registry::{Registry, ServiceMetaInfo};

use crate::dispatcher::{Dispatcher, ServiceHandler};
use crate::server::RpcServer;

/// A running provider: registered services, lease renewal, TCP server.
pub struct Provider {
    registry: Arc<dyn Registry>,
    address: SocketAddr,
    server: JoinHandle<()>,
}

impl Provider {
    /// Connects the configured registry and starts serving `services`.
    pub async fn start(config: &RpcConfig, services: Vec<ServiceHandler>) -> Result<Provider> {
        let registry = Arc::new(wirerpc_registry::connect(&config.registry).await?);
        Self::start_with_registry(config, services, registry).await
    }

    /// Like [`Provider::start`] with a caller-supplied registry. The
    /// provider takes ownership of its lifecycle: [`Provider::shutdown`]
    /// destroys it.
    pub async fn start_with_registry(
        config: &RpcConfig,
        services: Vec<ServiceHandler>,
        registry: Arc<dyn Registry>,
    ) -> Result<Provider> {
        let listener =
            TcpListener::bind(format!("{}:{}", config.server_host, config.server_port)).await?;
        let address = listener.local_addr()?;

        let mut dispatcher = Dispatcher::new();
        for service in services {
            let mut meta = ServiceMetaInfo::new(
                service.service_name(),
                &config.server_host,
                address.port(),
            );
            meta.service_version = service.service_version().to_string();
            registry.register(&meta).await?;
            dispatcher.register(service);
        }

        let server = RpcServer::new(Arc::new(dispatcher));
        let server = tokio::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                error!(error = %e, "rpc server stopped");
            }
        });

        info!(%address, "provider started");
        Ok(Provider {
            registry,
            address,
            server,
        })
    }

    /// The bound listen address, with the real port when 0 was configured.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Stops serving and withdraws every registration.
    pub async fn shutdown(self) {
        self.server.abort();
        self.registry.destroy().await;
        info!(address = %self.address, "provider stopped");
    }
}
