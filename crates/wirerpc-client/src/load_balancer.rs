//! Consumer-side load balancing.
//!
//! A balancer picks one provider out of the discovered list for a single
//! call. Balancers are stateless with respect to the provider list itself;
//! the list comes fresh from discovery each call, so membership changes
//! never need to be pushed into the balancer.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use wirerpc_common::strategy::StrategyRegistry;
use wirerpc_registry::ServiceMetaInfo;

/// Balancer keys used in configuration.
pub mod names {
    pub const ROUND_ROBIN: &str = "round_robin";
    pub const RANDOM: &str = "random";
    pub const CONSISTENT_HASH: &str = "consistent_hash";
}

/// Request attributes a balancer may key on.
pub struct RequestContext {
    pub method_name: String,
}

/// Picks one provider for one call.
pub trait LoadBalancer: Send + Sync {
    /// Returns `None` only when `providers` is empty.
    fn select(
        &self,
        context: &RequestContext,
        providers: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo>;
}

/// Rotates through providers with a shared atomic counter, so concurrent
/// calls spread without locking.
#[derive(Default)]
pub struct RoundRobinLoadBalancer {
    counter: AtomicUsize,
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn select(
        &self,
        _context: &RequestContext,
        providers: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo> {
        match providers {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                let index = self.counter.fetch_add(1, Ordering::Relaxed) % providers.len();
                Some(providers[index].clone())
            }
        }
    }
}

/// Uniform random choice.
#[derive(Default)]
pub struct RandomLoadBalancer;

impl LoadBalancer for RandomLoadBalancer {
    fn select(
        &self,
        _context: &RequestContext,
        providers: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo> {
        match providers {
            [] => None,
            [only] => Some(only.clone()),
            _ => {
                let index = rand::thread_rng().gen_range(0..providers.len());
                Some(providers[index].clone())
            }
        }
    }
}

/// Consistent hashing over a ring of virtual nodes.
///
/// Each provider occupies [`Self::DEFAULT_VIRTUAL_NODES`] positions on the
/// ring so load stays even with few providers. The request hashes on the
/// method name and takes the first ring position at or after its hash,
/// wrapping around at the top. The ring is rebuilt per call from the
/// provider list, which keeps the balancer stateless and means a departed
/// provider only remaps the requests that landed on it.
pub struct ConsistentHashLoadBalancer {
    virtual_nodes: usize,
}

impl ConsistentHashLoadBalancer {
    pub const DEFAULT_VIRTUAL_NODES: usize = 100;

    pub fn new(virtual_nodes: usize) -> Self {
        ConsistentHashLoadBalancer { virtual_nodes }
    }
}

impl Default for ConsistentHashLoadBalancer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VIRTUAL_NODES)
    }
}

impl LoadBalancer for ConsistentHashLoadBalancer {
    fn select(
        &self,
        context: &RequestContext,
        providers: &[ServiceMetaInfo],
    ) -> Option<ServiceMetaInfo> {
        if providers.is_empty() {
            return None;
        }

        let mut ring: BTreeMap<u64, &ServiceMetaInfo> = BTreeMap::new();
        for provider in providers {
            let address = provider.address();
            for i in 0..self.virtual_nodes {
                ring.insert(hash_key(&format!("{address}#{i}")), provider);
            }
        }

        let hash = hash_key(&context.method_name);
        ring.range(hash..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, provider)| (*provider).clone())
    }
}

fn hash_key<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Registry with all built-in balancers under their configuration keys.
pub fn default_load_balancers() -> StrategyRegistry<dyn LoadBalancer> {
    let mut registry: StrategyRegistry<dyn LoadBalancer> = StrategyRegistry::new();
    registry.register(names::ROUND_ROBIN, Arc::new(RoundRobinLoadBalancer::default()));
    registry.register(names::RANDOM, Arc::new(RandomLoadBalancer));
    registry.register(
        names::CONSISTENT_HASH,
        Arc::new(ConsistentHashLoadBalancer::default()),
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers(n: u16) -> Vec<ServiceMetaInfo> {
        (0..n)
            .map(|i| ServiceMetaInfo::new("Greet", "10.0.0.1", 9000 + i))
            .collect()
    }

    fn context(method: &str) -> RequestContext {
        RequestContext {
            method_name: method.to_string(),
        }
    }

    #[test]
    fn every_balancer_handles_empty_and_single() {
        let balancers: Vec<Box<dyn LoadBalancer>> = vec![
            Box::new(RoundRobinLoadBalancer::default()),
            Box::new(RandomLoadBalancer),
            Box::new(ConsistentHashLoadBalancer::default()),
        ];
        let one = providers(1);
        for balancer in &balancers {
            assert!(balancer.select(&context("m"), &[]).is_none());
            assert_eq!(
                balancer.select(&context("m"), &one).map(|p| p.service_port),
                Some(9000)
            );
        }
    }

    #[test]
    fn round_robin_cycles_evenly() {
        let balancer = RoundRobinLoadBalancer::default();
        let providers = providers(3);

        let picks: Vec<u16> = (0..6)
            .map(|_| {
                balancer
                    .select(&context("m"), &providers)
                    .map(|p| p.service_port)
                    .unwrap()
            })
            .collect();
        assert_eq!(picks, vec![9000, 9001, 9002, 9000, 9001, 9002]);
    }

    #[test]
    fn random_stays_within_the_list() {
        let balancer = RandomLoadBalancer;
        let providers = providers(3);
        for _ in 0..50 {
            let pick = balancer.select(&context("m"), &providers).unwrap();
            assert!(providers.contains(&pick));
        }
    }

    #[test]
    fn consistent_hash_is_deterministic_per_method() {
        let balancer = ConsistentHashLoadBalancer::default();
        let providers = providers(3);

        let first = balancer.select(&context("greet"), &providers).unwrap();
        for _ in 0..10 {
            assert_eq!(
                balancer.select(&context("greet"), &providers).unwrap(),
                first
            );
        }
    }

    #[test]
    fn consistent_hash_survives_unrelated_departure() {
        let balancer = ConsistentHashLoadBalancer::default();
        let all = providers(3);

        // Removing a provider the request does not map to never remaps
        // the request: only the departed provider's ring positions vanish.
        let pick = balancer.select(&context("greet"), &all).unwrap();
        let departed = all.iter().find(|p| **p != pick).unwrap();
        let kept: Vec<ServiceMetaInfo> = all
            .iter()
            .filter(|p| *p != departed)
            .cloned()
            .collect();
        assert_eq!(balancer.select(&context("greet"), &kept).unwrap(), pick);
    }

    #[test]
    fn registry_resolves_all_names() {
        let registry = default_load_balancers();
        for name in [names::ROUND_ROBIN, names::RANDOM, names::CONSISTENT_HASH] {
            assert!(registry.resolve(name).is_ok());
        }
        assert!(registry.resolve("least_loaded").is_err());
    }
}
