//! Data cache configuration.

use serde::Deserialize;

/// TTL-per-category cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for security facts (seconds). These rarely change.
    #[serde(default = "default_security_ttl_secs")]
    pub security_ttl_secs: u64,
    /// TTL for holder facts (seconds).
    #[serde(default = "default_holder_ttl_secs")]
    pub holder_ttl_secs: u64,
    /// TTL for price observations (seconds). Prices go stale fast.
    #[serde(default = "default_price_ttl_secs")]
    pub price_ttl_secs: u64,
    /// TTL for route quotes (seconds).
    #[serde(default = "default_route_ttl_secs")]
    pub route_ttl_secs: u64,
    /// Maximum resident entries; the oldest-written entries are evicted
    /// first once the cap is reached.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

const fn default_security_ttl_secs() -> u64 {
    600
}

const fn default_holder_ttl_secs() -> u64 {
    120
}

const fn default_price_ttl_secs() -> u64 {
    5
}

const fn default_route_ttl_secs() -> u64 {
    10
}

const fn default_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            security_ttl_secs: default_security_ttl_secs(),
            holder_ttl_secs: default_holder_ttl_secs(),
            price_ttl_secs: default_price_ttl_secs(),
            route_ttl_secs: default_route_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}
