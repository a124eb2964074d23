use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The outcome of one remote call.
///
/// Exactly one of `data` and `error` is meaningful: a successful call
/// carries `data` (and optionally its type descriptor), a failed call
/// carries `error` with the failure text. `message` holds a short
/// human-readable status either way.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub data: Option<Value>,
    pub data_type: Option<String>,
    pub message: String,
    pub error: Option<String>,
}

impl RpcResponse {
    /// Creates a successful response.
    pub fn ok(data: Value, data_type: Option<String>) -> Self {
        RpcResponse {
            data: Some(data),
            data_type,
            message: "ok".to_string(),
            error: None,
        }
    }

    /// Creates a failed response carrying the invocation error text.
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        RpcResponse {
            data: None,
            data_type: None,
            message: error.clone(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_and_failure_are_disjoint() {
        let ok = RpcResponse::ok(json!("hello world"), Some("string".into()));
        assert!(ok.is_ok());
        assert_eq!(ok.data, Some(json!("hello world")));
        assert_eq!(ok.error, None);

        let failed = RpcResponse::failure("boom");
        assert!(!failed.is_ok());
        assert_eq!(failed.data, None);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
