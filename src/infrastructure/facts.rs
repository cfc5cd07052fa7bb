//! REST client for security and holder facts.
//!
//! Facts are not available on the stream, so they are fetched over HTTP —
//! always through the rate limiter's `Facts` budget and the data cache. A
//! cache hit never issues a network call.

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::domain::InstrumentId;
use crate::error::Result;
use crate::infrastructure::cache::{CacheCategory, DataCache};
use crate::infrastructure::limiter::{EndpointClass, Priority, RateLimiter};

/// Read-through facts client.
#[derive(Clone)]
pub struct FactsClient {
    http: Client,
    base_url: String,
    limiter: RateLimiter,
    cache: DataCache,
}

impl FactsClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, limiter: RateLimiter, cache: DataCache) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            limiter,
            cache,
        }
    }

    /// Contract-level security facts for `instrument`.
    ///
    /// # Errors
    ///
    /// Returns an error when the upstream request fails; a stale cache is
    /// never served past its TTL.
    pub async fn security_facts(&self, instrument: &InstrumentId) -> Result<Value> {
        self.fetch("security", CacheCategory::Security, instrument)
            .await
    }

    /// Holder distribution facts for `instrument`.
    ///
    /// # Errors
    ///
    /// Returns an error when the upstream request fails.
    pub async fn holder_facts(&self, instrument: &InstrumentId) -> Result<Value> {
        self.fetch("holders", CacheCategory::Holder, instrument).await
    }

    async fn fetch(
        &self,
        segment: &str,
        category: CacheCategory,
        instrument: &InstrumentId,
    ) -> Result<Value> {
        let key = format!("{segment}:{instrument}");
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        self.limiter
            .acquire(EndpointClass::Facts, Priority::Normal)
            .await;
        let url = format!(
            "{}/{segment}/{instrument}",
            self.base_url.trim_end_matches('/')
        );
        debug!(url = %url, "Fetching facts");
        let value: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.cache.set(key, value.clone(), category);
        Ok(value)
    }
}
