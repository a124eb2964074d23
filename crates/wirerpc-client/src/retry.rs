//! Retry policies.
//!
//! A policy drives an attempt closure to completion. The closure builds a
//! fresh request message each time it runs, so every attempt goes out with
//! its own correlation id and a late reply to a failed attempt can never
//! satisfy a retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use wirerpc_common::protocol::{Result, RpcResponse};
use wirerpc_common::strategy::StrategyRegistry;

/// Retry policy keys used in configuration.
pub mod names {
    pub const NONE: &str = "none";
    pub const FIXED_INTERVAL: &str = "fixed_interval";
}

/// One full call attempt, including transport round trip.
pub type Attempt = dyn Fn() -> BoxFuture<'static, Result<RpcResponse>> + Send + Sync;

/// Drives an attempt to success or gives up.
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    async fn execute(&self, attempt: &Attempt) -> Result<RpcResponse>;
}

/// Runs the attempt exactly once.
#[derive(Default)]
pub struct NoRetry;

#[async_trait]
impl RetryPolicy for NoRetry {
    async fn execute(&self, attempt: &Attempt) -> Result<RpcResponse> {
        attempt().await
    }
}

/// Retries with a fixed pause between attempts. Returns the last error
/// once the attempt budget is spent.
pub struct FixedIntervalRetry {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl FixedIntervalRetry {
    pub fn new(max_attempts: usize, interval: Duration) -> Self {
        FixedIntervalRetry {
            max_attempts,
            interval,
        }
    }
}

impl Default for FixedIntervalRetry {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

#[async_trait]
impl RetryPolicy for FixedIntervalRetry {
    async fn execute(&self, attempt: &Attempt) -> Result<RpcResponse> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts < self.max_attempts => {
                    warn!(
                        attempt = attempts,
                        max = self.max_attempts,
                        error = %e,
                        "call attempt failed, retrying"
                    );
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Registry with the built-in policies under their configuration keys.
pub fn default_retry_policies() -> StrategyRegistry<dyn RetryPolicy> {
    let mut registry: StrategyRegistry<dyn RetryPolicy> = StrategyRegistry::new();
    registry.register(names::NONE, Arc::new(NoRetry));
    registry.register(names::FIXED_INTERVAL, Arc::new(FixedIntervalRetry::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use wirerpc_common::protocol::RpcError;

    /// Attempt that fails `failures` times, then succeeds.
    fn flaky(failures: usize) -> (Arc<AtomicUsize>, Box<Attempt>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let attempt = Box::new(move || -> BoxFuture<'static, Result<RpcResponse>> {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                if n <= failures {
                    Err(RpcError::Connection(format!("attempt {n} refused")))
                } else {
                    Ok(RpcResponse::ok(json!("pong"), Some("string".into())))
                }
            })
        });
        (calls, attempt)
    }

    #[tokio::test]
    async fn no_retry_gives_up_immediately() {
        let (calls, attempt) = flaky(1);
        let result = NoRetry.execute(&*attempt).await;
        assert!(matches!(result, Err(RpcError::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retry_passes_through_success() {
        let (calls, attempt) = flaky(0);
        let response = NoRetry.execute(&*attempt).await.unwrap();
        assert_eq!(response.data, Some(json!("pong")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_interval_recovers_within_budget() {
        let policy = FixedIntervalRetry::default();
        let (calls, attempt) = flaky(2);

        let response = policy.execute(&*attempt).await.unwrap();
        assert!(response.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_interval_returns_last_error_when_exhausted() {
        let policy = FixedIntervalRetry::default();
        let (calls, attempt) = flaky(10);

        let result = policy.execute(&*attempt).await;
        match result {
            Err(RpcError::Connection(text)) => assert!(text.contains("attempt 3")),
            other => panic!("expected connection error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn registry_resolves_all_names() {
        let registry = default_retry_policies();
        assert!(registry.resolve(names::NONE).is_ok());
        assert!(registry.resolve(names::FIXED_INTERVAL).is_ok());
        assert!(registry.resolve("exponential").is_err());
    }
}
