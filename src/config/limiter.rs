//! Rate limiter configuration.

use serde::Deserialize;

/// Sliding-window rate limiter configuration.
///
/// Each endpoint class has its own request budget over the same rolling
/// window. The drain interval is the cadence at which queued waiters are
/// re-examined against available capacity.
#[derive(Debug, Clone, Deserialize)]
pub struct LimiterConfig {
    /// Rolling window length (milliseconds).
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Queue drain cadence (milliseconds).
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Requests per window for market-data endpoints.
    #[serde(default = "default_market_data_limit")]
    pub market_data_limit: usize,
    /// Requests per window for trading endpoints.
    #[serde(default = "default_trading_limit")]
    pub trading_limit: usize,
    /// Requests per window for facts (security/holder) endpoints.
    #[serde(default = "default_facts_limit")]
    pub facts_limit: usize,
}

const fn default_window_ms() -> u64 {
    1_000
}

const fn default_drain_interval_ms() -> u64 {
    25
}

const fn default_market_data_limit() -> usize {
    50
}

const fn default_trading_limit() -> usize {
    10
}

const fn default_facts_limit() -> usize {
    5
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            drain_interval_ms: default_drain_interval_ms(),
            market_data_limit: default_market_data_limit(),
            trading_limit: default_trading_limit(),
            facts_limit: default_facts_limit(),
        }
    }
}
