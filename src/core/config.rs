/*!
 * Engine Configuration
 *
 * Runtime sizing for the permission engine caches
 */

use crate::core::limits::{
    DEFAULT_RESOLVER_CACHE_CAPACITY, DEFAULT_RESOLVER_CACHE_STRIPES, DEFAULT_USER_CACHE_CAPACITY,
};
use std::str::FromStr;
use tracing::warn;

/// Environment variable overriding the resolver cache capacity
pub const ENV_RESOLVER_CACHE_CAPACITY: &str = "PERM_RESOLVER_CACHE_CAPACITY";

/// Environment variable overriding the resolver stripe count
pub const ENV_RESOLVER_CACHE_STRIPES: &str = "PERM_RESOLVER_CACHE_STRIPES";

/// Environment variable overriding the user cache capacity
pub const ENV_USER_CACHE_CAPACITY: &str = "PERM_USER_CACHE_CAPACITY";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Total resolver cache entries (0 disables caching)
    pub resolver_cache_capacity: usize,
    /// Number of LRU stripes, rounded up to a power of two
    pub resolver_cache_stripes: usize,
    /// Users kept loaded at once (0 disables caching)
    pub user_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolver_cache_capacity: DEFAULT_RESOLVER_CACHE_CAPACITY,
            resolver_cache_stripes: DEFAULT_RESOLVER_CACHE_STRIPES,
            user_cache_capacity: DEFAULT_USER_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            resolver_cache_capacity: env_or(
                ENV_RESOLVER_CACHE_CAPACITY,
                defaults.resolver_cache_capacity,
            ),
            resolver_cache_stripes: env_or(
                ENV_RESOLVER_CACHE_STRIPES,
                defaults.resolver_cache_stripes,
            ),
            user_cache_capacity: env_or(ENV_USER_CACHE_CAPACITY, defaults.user_cache_capacity),
        }
    }

    pub fn with_resolver_cache_capacity(mut self, capacity: usize) -> Self {
        self.resolver_cache_capacity = capacity;
        self
    }

    pub fn with_resolver_cache_stripes(mut self, stripes: usize) -> Self {
        self.resolver_cache_stripes = stripes;
        self
    }

    pub fn with_user_cache_capacity(mut self, capacity: usize) -> Self {
        self.user_cache_capacity = capacity;
        self
    }

    /// Stripe count actually used: at least one, and a power of two
    pub fn effective_stripes(&self) -> usize {
        self.resolver_cache_stripes.max(1).next_power_of_two()
    }

    /// Capacity of each stripe (rounded up so the total is never below the request)
    pub fn per_stripe_capacity(&self) -> usize {
        let stripes = self.effective_stripes();
        self.resolver_cache_capacity.div_ceil(stripes)
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, fallback = %default, "Ignoring unparsable configuration value");
                default
            }
        },
        Err(_) => default,
    }
}
