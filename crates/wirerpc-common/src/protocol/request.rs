use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default version assigned to services that do not declare one.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0";

/// Identifies a single remote call: which service, which method, which
/// arguments. Together with the correlation id carried in the message
/// header this is unambiguous per outstanding call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub service_name: String,
    pub method_name: String,
    pub service_version: String,
    /// Parameter type descriptors, used by the dispatcher to pick a method
    /// overload. Descriptors use JSON kind names ("bool", "int", "float",
    /// "string", "array", "object", "null").
    pub parameter_types: Vec<String>,
    pub args: Vec<Value>,
}

impl RpcRequest {
    /// Builds a request for the default service version, deriving parameter
    /// type descriptors from the argument values.
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>, args: Vec<Value>) -> Self {
        let parameter_types = args.iter().map(|v| json_type_name(v).to_string()).collect();
        RpcRequest {
            service_name: service_name.into(),
            method_name: method_name.into(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
            parameter_types,
            args,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// The logical service identity, independent of instance location.
    /// Always recomputed from the fields so it can never drift.
    pub fn service_key(&self) -> String {
        format!("{}:{}", self.service_name, self.service_version)
    }
}

/// Maps a JSON value to its parameter type descriptor.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_key_is_name_and_version() {
        let request = RpcRequest::new("Greet", "hello", vec![json!("world")]);
        assert_eq!(request.service_key(), "Greet:1.0");
        assert_eq!(
            request.with_version("2.1").service_key(),
            "Greet:2.1"
        );
    }

    #[test]
    fn parameter_types_follow_args() {
        let request = RpcRequest::new(
            "Calc",
            "mixed",
            vec![json!(1), json!(2.5), json!("x"), json!(true), json!(null)],
        );
        assert_eq!(
            request.parameter_types,
            vec!["int", "float", "string", "bool", "null"]
        );
    }
}
