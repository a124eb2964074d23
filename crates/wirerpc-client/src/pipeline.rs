//! The consumer call pipeline.
//!
//! [`ServiceClient`] ties the pieces together: discovery through the
//! registry, provider selection through the load balancer, the network
//! attempt through the transport, wrapped by the retry policy, with the
//! fault-tolerance strategy deciding what the caller sees when the retry
//! budget is spent.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use wirerpc_common::config::RpcConfig;
use wirerpc_common::protocol::{Message, MessageBody, Result, RpcError, RpcRequest, RpcResponse};
use wirerpc_common::serializer::SerializerRegistry;
use wirerpc_common::transport::TcpTransport;
use wirerpc_registry::Registry;

use crate::load_balancer::{default_load_balancers, LoadBalancer, RequestContext};
use crate::retry::{default_retry_policies, RetryPolicy};
use crate::tolerant::{default_tolerant_strategies, TolerantStrategy};

/// Consumer-side handle for calling remote services.
///
/// Strategies are resolved once at construction from the configuration
/// keys; an unknown key fails construction rather than the first call.
pub struct ServiceClient {
    config: RpcConfig,
    registry: Arc<dyn Registry>,
    transport: Arc<TcpTransport>,
    serializer_id: u8,
    load_balancer: Arc<dyn LoadBalancer>,
    retry_policy: Arc<dyn RetryPolicy>,
    tolerant: Arc<dyn TolerantStrategy>,
}

impl ServiceClient {
    pub fn new(config: RpcConfig, registry: Arc<dyn Registry>) -> Result<Self> {
        let serializers = Arc::new(SerializerRegistry::default());
        let serializer_id = serializers.by_name(&config.serializer)?.id();

        let load_balancer = default_load_balancers().resolve(&config.load_balancer)?;
        let retry_policy = default_retry_policies().resolve(&config.retry_policy)?;
        let tolerant = default_tolerant_strategies().resolve(&config.tolerant_strategy)?;

        Ok(ServiceClient {
            config,
            registry,
            transport: Arc::new(TcpTransport::new(serializers)),
            serializer_id,
            load_balancer,
            retry_policy,
            tolerant,
        })
    }

    /// Performs one remote call and returns the response payload.
    pub async fn call(&self, request: RpcRequest) -> Result<Value> {
        self.call_returning(request, "object").await
    }

    /// Like [`ServiceClient::call`], with a declared return-type
    /// descriptor. Mock mode uses the descriptor to pick the zero value it
    /// answers with; a real call ignores it.
    pub async fn call_returning(&self, request: RpcRequest, return_type: &str) -> Result<Value> {
        if self.config.mock {
            debug!(
                service = %request.service_name,
                method = %request.method_name,
                return_type,
                "mock mode, returning zero value"
            );
            return Ok(mock_value(return_type));
        }

        let service_key = request.service_key();
        let providers = self.registry.service_discovery(&service_key).await?;
        if providers.is_empty() {
            return Err(RpcError::NoProviderAvailable(service_key));
        }

        let context = RequestContext {
            method_name: request.method_name.clone(),
        };
        let provider = self
            .load_balancer
            .select(&context, &providers)
            .ok_or_else(|| RpcError::NoProviderAvailable(service_key.clone()))?;
        let address = provider.address();
        debug!(service = %service_key, provider = %address, "provider selected");

        let transport = Arc::clone(&self.transport);
        let serializer_id = self.serializer_id;
        let attempt_request = request.clone();
        let attempt = move || -> BoxFuture<'static, Result<RpcResponse>> {
            let transport = Arc::clone(&transport);
            let address = address.clone();
            let request = attempt_request.clone();
            Box::pin(async move {
                // Fresh message per attempt, so every retry goes out with
                // its own correlation id.
                let message = Message::request(serializer_id, request);
                let reply = transport.invoke(&address, &message).await?;
                match reply.body {
                    MessageBody::Response(response) => Ok(response),
                    MessageBody::Request(_) => Err(RpcError::Connection(
                        "peer answered with a request message".to_string(),
                    )),
                }
            })
        };

        let response = match self.retry_policy.execute(&attempt).await {
            Ok(response) => response,
            Err(error) => {
                let context = HashMap::from([
                    ("service".to_string(), service_key),
                    ("method".to_string(), request.method_name),
                ]);
                self.tolerant.handle(&context, error)?
            }
        };

        // A well-formed response still carries the provider-side outcome.
        if let Some(error) = response.error {
            return Err(RpcError::RemoteCall(error));
        }
        Ok(response.data.unwrap_or(Value::Null))
    }
}

/// Zero value for a declared return-type descriptor.
fn mock_value(return_type: &str) -> Value {
    match return_type {
        "bool" => Value::Bool(false),
        "int" => Value::from(0),
        "float" => Value::from(0.0),
        "string" => Value::from(""),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use wirerpc_common::codec;
    use wirerpc_common::framer::StreamFramer;
    use wirerpc_registry::{MemoryStore, Registry as _, ServiceMetaInfo, StoreRegistry};

    fn config() -> RpcConfig {
        RpcConfig {
            registry: wirerpc_common::config::RegistryConfig {
                kind: "memory".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn registry_with(metas: &[ServiceMetaInfo]) -> Arc<StoreRegistry> {
        let registry = StoreRegistry::new(Arc::new(MemoryStore::new()));
        for meta in metas {
            registry.register(meta).await.unwrap();
        }
        Arc::new(registry)
    }

    /// One-shot provider answering every request with `response`.
    async fn spawn_responder(response: RpcResponse) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let serializers = SerializerRegistry::default();
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut framer = StreamFramer::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return;
                }
                if let Some(frame) = framer.push(&chunk[..n]).unwrap().into_iter().next() {
                    let message = codec::decode(&frame, &serializers).unwrap();
                    let reply = Message::response_to(&message.header, response);
                    stream
                        .write_all(&codec::encode(&reply, &serializers).unwrap())
                        .await
                        .unwrap();
                    return;
                }
            }
        });
        port
    }

    #[tokio::test]
    async fn call_round_trips_through_a_provider() {
        let port = spawn_responder(RpcResponse::ok(json!("hello world"), Some("string".into())))
            .await;
        let registry = registry_with(&[ServiceMetaInfo::new("Greet", "127.0.0.1", port)]).await;

        let client = ServiceClient::new(config(), registry.clone()).unwrap();
        let value = client
            .call(RpcRequest::new("Greet", "hello", vec![json!("world")]))
            .await
            .unwrap();

        assert_eq!(value, json!("hello world"));
        registry.destroy().await;
    }

    #[tokio::test]
    async fn provider_side_failure_surfaces_as_remote_call_error() {
        let port = spawn_responder(RpcResponse::failure("no such method")).await;
        let registry = registry_with(&[ServiceMetaInfo::new("Greet", "127.0.0.1", port)]).await;

        let client = ServiceClient::new(config(), registry.clone()).unwrap();
        let result = client
            .call(RpcRequest::new("Greet", "nope", vec![]))
            .await;

        match result {
            Err(RpcError::RemoteCall(text)) => assert_eq!(text, "no such method"),
            other => panic!("expected remote call error, got {other:?}"),
        }
        registry.destroy().await;
    }

    #[tokio::test]
    async fn no_provider_fails_before_any_network_attempt() {
        let registry = registry_with(&[]).await;
        let client = ServiceClient::new(config(), registry.clone()).unwrap();

        let result = client.call(RpcRequest::new("Greet", "hello", vec![])).await;
        match result {
            Err(RpcError::NoProviderAvailable(key)) => assert_eq!(key, "Greet:1.0"),
            other => panic!("expected no provider error, got {other:?}"),
        }
        registry.destroy().await;
    }

    #[tokio::test]
    async fn unknown_strategy_key_fails_construction() {
        let registry = registry_with(&[]).await;
        let bad = RpcConfig {
            load_balancer: "least_loaded".to_string(),
            ..config()
        };
        assert!(matches!(
            ServiceClient::new(bad, registry).err(),
            Some(RpcError::UnknownStrategy(_))
        ));
    }

    #[tokio::test]
    async fn mock_mode_never_touches_the_network() {
        let registry = registry_with(&[]).await;
        let mock = RpcConfig {
            mock: true,
            ..config()
        };
        let client = ServiceClient::new(mock, registry.clone()).unwrap();

        // No provider registered, yet the call succeeds with zero values.
        let request = |args| RpcRequest::new("Greet", "hello", args);
        assert_eq!(
            client.call_returning(request(vec![]), "string").await.unwrap(),
            json!("")
        );
        assert_eq!(
            client.call_returning(request(vec![]), "int").await.unwrap(),
            json!(0)
        );
        assert_eq!(
            client.call_returning(request(vec![]), "bool").await.unwrap(),
            json!(false)
        );
        assert_eq!(client.call(request(vec![])).await.unwrap(), Value::Null);
        registry.destroy().await;
    }

    #[test]
    fn mock_values_cover_the_descriptors() {
        assert_eq!(mock_value("float"), json!(0.0));
        assert_eq!(mock_value("array"), Value::Null);
        assert_eq!(mock_value("object"), Value::Null);
    }
}
