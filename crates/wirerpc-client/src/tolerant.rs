//! Fault-tolerance strategies.
//!
//! Applied once per call, after the retry policy has given up. The
//! strategy decides what the caller sees: the error itself, a harmless
//! empty response, or an honest "no fallback configured" failure.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use wirerpc_common::protocol::{Result, RpcError, RpcResponse};
use wirerpc_common::strategy::StrategyRegistry;

/// Fault-tolerance keys used in configuration.
pub mod names {
    pub const FAIL_FAST: &str = "fail_fast";
    pub const FAIL_SAFE: &str = "fail_safe";
    pub const FAIL_OVER: &str = "fail_over";
    pub const FAIL_BACK: &str = "fail_back";
}

/// Turns a call failure into the caller-visible outcome.
pub trait TolerantStrategy: Send + Sync {
    /// `context` carries call attributes (service, method) for logging and
    /// for strategies that route to alternates.
    fn handle(&self, context: &HashMap<String, String>, error: RpcError) -> Result<RpcResponse>;
}

/// Propagates the failure to the caller unchanged.
#[derive(Default)]
pub struct FailFast;

impl TolerantStrategy for FailFast {
    fn handle(&self, _context: &HashMap<String, String>, error: RpcError) -> Result<RpcResponse> {
        Err(error)
    }
}

/// Swallows the failure: logs it and hands the caller an empty response,
/// for call sites where a degraded answer beats an error.
#[derive(Default)]
pub struct FailSafe;

impl TolerantStrategy for FailSafe {
    fn handle(&self, context: &HashMap<String, String>, error: RpcError) -> Result<RpcResponse> {
        warn!(?context, error = %error, "call failed, returning empty response");
        Ok(RpcResponse::default())
    }
}

/// Would re-route the call to another provider. No alternate path is
/// wired up, so it reports that instead of silently degrading.
#[derive(Default)]
pub struct FailOver;

impl TolerantStrategy for FailOver {
    fn handle(&self, _context: &HashMap<String, String>, error: RpcError) -> Result<RpcResponse> {
        Err(RpcError::NoFallback(format!(
            "fail_over is configured but no alternate provider path exists; original failure: {error}"
        )))
    }
}

/// Would invoke a local fallback method. None is registered, so it reports
/// that instead of silently degrading.
#[derive(Default)]
pub struct FailBack;

impl TolerantStrategy for FailBack {
    fn handle(&self, _context: &HashMap<String, String>, error: RpcError) -> Result<RpcResponse> {
        Err(RpcError::NoFallback(format!(
            "fail_back is configured but no fallback handler is registered; original failure: {error}"
        )))
    }
}

/// Registry with the built-in strategies under their configuration keys.
pub fn default_tolerant_strategies() -> StrategyRegistry<dyn TolerantStrategy> {
    let mut registry: StrategyRegistry<dyn TolerantStrategy> = StrategyRegistry::new();
    registry.register(names::FAIL_FAST, Arc::new(FailFast));
    registry.register(names::FAIL_SAFE, Arc::new(FailSafe));
    registry.register(names::FAIL_OVER, Arc::new(FailOver));
    registry.register(names::FAIL_BACK, Arc::new(FailBack));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HashMap<String, String> {
        HashMap::from([("service".to_string(), "Greet:1.0".to_string())])
    }

    #[test]
    fn fail_fast_propagates_the_error() {
        let result = FailFast.handle(&context(), RpcError::Timeout(5000));
        assert!(matches!(result, Err(RpcError::Timeout(5000))));
    }

    #[test]
    fn fail_safe_swallows_the_error() {
        let response = FailSafe
            .handle(&context(), RpcError::Connection("refused".into()))
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(response.data, None);
    }

    #[test]
    fn stubbed_strategies_say_so() {
        for strategy in [
            Box::new(FailOver) as Box<dyn TolerantStrategy>,
            Box::new(FailBack),
        ] {
            match strategy.handle(&context(), RpcError::Connection("refused".into())) {
                Err(RpcError::NoFallback(text)) => assert!(text.contains("refused")),
                other => panic!("expected NoFallback, got {other:?}"),
            }
        }
    }

    #[test]
    fn registry_resolves_all_names() {
        let registry = default_tolerant_strategies();
        for name in [
            names::FAIL_FAST,
            names::FAIL_SAFE,
            names::FAIL_OVER,
            names::FAIL_BACK,
        ] {
            assert!(registry.resolve(name).is_ok());
        }
    }
}
