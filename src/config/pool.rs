//! Connection pool, heartbeat, and reconnection configuration.

use serde::Deserialize;

/// Stream reconnection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Initial delay before the first reconnection attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Random jitter added to each delay, as a fraction of the delay
    /// (0.25 = up to 25% extra).
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// Consecutive failed attempts before the worker gives up and reports
    /// the connection as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_ratio() -> f64 {
    0.25
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ratio: default_jitter_ratio(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Connection pool configuration.
///
/// One physical connection is held per URL and shared by all subscribers
/// to that URL; these settings control heartbeating and channel sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Interval between heartbeat pings (milliseconds).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Time to wait for a pong before forcing a reconnect (milliseconds).
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// Inbound fan-out channel capacity per connection (bounded to keep a
    /// slow subscriber from growing memory without limit).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Outbound frame queue capacity per connection.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

const fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

const fn default_pong_timeout_ms() -> u64 {
    5_000
}

const fn default_channel_capacity() -> usize {
    4_096
}

const fn default_outbound_capacity() -> usize {
    256
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}
