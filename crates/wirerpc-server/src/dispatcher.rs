//! Request dispatch.
//!
//! The dispatch table is built once at registration time and immutable
//! afterwards, so lookup on the hot path is two hash probes with no
//! locking. Methods are keyed by name plus parameter-type signature;
//! overloads that differ only in signature coexist. A request whose
//! descriptors match nothing falls back to the method name alone when the
//! name is unambiguous, which tolerates descriptor drift between peers
//! (e.g. an `int` argument described as `float`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use wirerpc_common::protocol::{json_type_name, RpcRequest, RpcResponse};

/// A registered method body. Returns the result value or an error text
/// that travels back to the consumer in the response.
pub type Handler = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    method_name: String,
    signature: Vec<String>,
}

/// The methods of one published service, built fluently:
///
/// ```
/// use serde_json::{json, Value};
/// use wirerpc_server::ServiceHandler;
///
/// let service = ServiceHandler::new("Greet")
///     .method("hello", &["string"], |args: &[Value]| {
///         let name = args[0].as_str().unwrap_or_default();
///         Ok(json!(format!("hello {name}")))
///     });
/// ```
pub struct ServiceHandler {
    service_name: String,
    service_version: String,
    methods: HashMap<MethodKey, Handler>,
}

impl ServiceHandler {
    pub fn new(service_name: impl Into<String>) -> Self {
        ServiceHandler {
            service_name: service_name.into(),
            service_version: wirerpc_common::protocol::DEFAULT_SERVICE_VERSION.to_string(),
            methods: HashMap::new(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Registers one method under a parameter-type signature. Descriptors
    /// use JSON kind names ("bool", "int", "float", "string", "array",
    /// "object", "null").
    pub fn method<F>(mut self, name: impl Into<String>, signature: &[&str], handler: F) -> Self
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let key = MethodKey {
            method_name: name.into(),
            signature: signature.iter().map(|s| s.to_string()).collect(),
        };
        self.methods.insert(key, Arc::new(handler));
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }
}

/// Routes decoded requests to registered handlers.
#[derive(Default)]
pub struct Dispatcher {
    services: HashMap<String, ServiceHandler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            services: HashMap::new(),
        }
    }

    /// Adds one service, replacing a previous registration of the same
    /// name.
    pub fn register(&mut self, service: ServiceHandler) {
        self.services.insert(service.service_name.clone(), service);
    }

    /// Invokes the handler matching `request`. Lookup and handler failures
    /// both come back as failure responses, never as transport errors: the
    /// call reached the provider, so the provider answers.
    pub fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let Some(service) = self.services.get(&request.service_name) else {
            return RpcResponse::failure(format!(
                "unknown service '{}'",
                request.service_name
            ));
        };

        let exact = MethodKey {
            method_name: request.method_name.clone(),
            signature: request.parameter_types.clone(),
        };
        let handler = service.methods.get(&exact).or_else(|| {
            let mut candidates = service
                .methods
                .iter()
                .filter(|(key, _)| key.method_name == request.method_name)
                .map(|(_, handler)| handler);
            match (candidates.next(), candidates.next()) {
                // Unambiguous name: accept despite the signature mismatch.
                (Some(handler), None) => Some(handler),
                _ => None,
            }
        });

        let Some(handler) = handler else {
            return RpcResponse::failure(format!(
                "no method '{}.{}' matching ({})",
                request.service_name,
                request.method_name,
                request.parameter_types.join(", ")
            ));
        };

        debug!(
            service = %request.service_name,
            method = %request.method_name,
            "dispatching request"
        );
        match handler(&request.args) {
            Ok(value) => {
                let data_type = json_type_name(&value).to_string();
                RpcResponse::ok(value, Some(data_type))
            }
            Err(text) => RpcResponse::failure(text),
        }
    }
}
