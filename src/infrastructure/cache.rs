//! TTL cache with per-category lifetimes and oldest-first eviction.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::config::CacheConfig;

/// Cache categories, each with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCategory {
    Security,
    Holder,
    Price,
    Route,
}

impl CacheCategory {
    fn index(self) -> usize {
        match self {
            Self::Security => 0,
            Self::Holder => 1,
            Self::Price => 2,
            Self::Route => 3,
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

struct CacheInner {
    entries: DashMap<String, CacheEntry>,
    /// Keys in insertion order, for oldest-first eviction.
    order: Mutex<VecDeque<String>>,
    ttls: [Duration; 4],
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Shared read-through cache for facts, prices, and route quotes.
///
/// Expiry is checked at retrieval time: an expired entry counts as a miss
/// and is removed, so a value past its TTL is never returned. When the
/// entry cap is reached, the oldest-written entries are evicted first.
#[derive(Clone)]
pub struct DataCache {
    inner: Arc<CacheInner>,
}

impl DataCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                order: Mutex::new(VecDeque::new()),
                ttls: [
                    Duration::from_secs(config.security_ttl_secs),
                    Duration::from_secs(config.holder_ttl_secs),
                    Duration::from_secs(config.price_ttl_secs),
                    Duration::from_secs(config.route_ttl_secs),
                ],
                max_entries: config.max_entries,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Look up `key`, treating an expired entry as a miss.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let live = {
            let entry = self.inner.entries.get(key);
            entry.and_then(|e| (e.expires_at > now).then(|| e.value.clone()))
        };
        if let Some(value) = live {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }
        self.inner
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value` under `key` with the category's TTL, evicting the
    /// oldest entries if the cache is over capacity.
    pub fn set(&self, key: impl Into<String>, value: Value, category: CacheCategory) {
        let key = key.into();
        let expires_at = Instant::now() + self.inner.ttls[category.index()];
        let previous = self.inner.entries.insert(
            key.clone(),
            CacheEntry { value, expires_at },
        );
        trace!(key = %key, category = ?category, "Cache set");

        let mut order = self.inner.order.lock();
        if previous.is_none() {
            order.push_back(key);
        }
        while self.inner.entries.len() > self.inner.max_entries {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            if self.inner.entries.remove(&oldest).is_some() {
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Point-in-time statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            entries: self.inner.entries.len(),
        }
    }
}
