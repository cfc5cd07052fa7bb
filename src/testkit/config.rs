//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use crate::config::{ExecutionConfig, LimiterConfig, PoolConfig, ReconnectionConfig};

/// Fast reconnection config with zero delays — no waiting in tests.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
        jitter_ratio: 0.0,
        max_attempts: 3,
    }
}

/// Pool config with a long heartbeat so pings never interfere.
///
/// For tests that need specific heartbeat timing, override the interval
/// fields on the returned struct.
pub fn pool() -> PoolConfig {
    PoolConfig {
        heartbeat_interval_ms: 60_000,
        pong_timeout_ms: 5_000,
        channel_capacity: 256,
        outbound_capacity: 32,
    }
}

/// Limiter config with a short window so over-budget waits stay fast.
pub fn limiter(window_ms: u64, limit: usize) -> LimiterConfig {
    LimiterConfig {
        window_ms,
        drain_interval_ms: 5,
        market_data_limit: limit,
        trading_limit: limit,
        facts_limit: limit,
    }
}

/// Execution config with a millisecond retry delay.
pub fn execution() -> ExecutionConfig {
    ExecutionConfig {
        retry_delay_ms: 1,
        ..ExecutionConfig::default()
    }
}
