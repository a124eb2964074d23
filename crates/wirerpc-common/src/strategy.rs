//! String-keyed strategy registry.
//!
//! Every pluggable component (load balancer, retry policy, tolerant
//! strategy, registry kind) is resolved from a configuration key through an
//! explicit registry passed to the component that needs it. Construction is
//! explicit and injectable for testing; there is no hidden global factory
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::error::{Result, RpcError};

/// Maps string keys to shared strategy implementations.
pub struct StrategyRegistry<T: ?Sized> {
    entries: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> StrategyRegistry<T> {
    pub fn new() -> Self {
        StrategyRegistry {
            entries: HashMap::new(),
        }
    }

    /// Registers a strategy under a key, replacing any previous entry.
    pub fn register(&mut self, key: impl Into<String>, strategy: Arc<T>) {
        self.entries.insert(key.into(), strategy);
    }

    /// Resolves a strategy; fails with `UnknownStrategy` for keys nothing
    /// was registered under.
    pub fn resolve(&self, key: &str) -> Result<Arc<T>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| RpcError::UnknownStrategy(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

impl<T: ?Sized> Default for StrategyRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Plain;
    impl Greeter for Plain {
        fn greet(&self) -> &'static str {
            "hi"
        }
    }

    #[test]
    fn resolves_registered_keys() {
        let mut registry: StrategyRegistry<dyn Greeter> = StrategyRegistry::new();
        registry.register("plain", Arc::new(Plain));

        assert_eq!(registry.resolve("plain").unwrap().greet(), "hi");
        assert!(matches!(
            registry.resolve("missing"),
            Err(RpcError::UnknownStrategy(_))
        ));
    }
}
