//! Configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; every field has a sensible
//! default so a minimal file (or an empty one) is valid.

pub mod cache;
pub mod limiter;
pub mod logging;
pub mod pool;
pub mod trading;

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigError, Result};

pub use cache::CacheConfig;
pub use limiter::LimiterConfig;
pub use logging::LoggingConfig;
pub use pool::{PoolConfig, ReconnectionConfig};
pub use trading::{
    ExecutionConfig, PipelineConfig, PositionConfig, RiskConfig, SelectorConfig,
};

/// Upstream data source endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    /// WebSocket feed URLs. Each URL gets one shared physical connection.
    #[serde(default)]
    pub ws_urls: Vec<String>,
    /// REST base URL for security/holder facts. Empty disables the facts
    /// client.
    #[serde(default)]
    pub facts_api_url: String,
    /// Path for the position ledger snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

fn default_snapshot_path() -> String {
    "riptide-snapshot.json".to_string()
}

/// Main application configuration.
///
/// Load from a TOML file with [`Config::load`] or parse directly with
/// [`Config::parse_toml`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream feed and REST endpoints.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Connection pool and heartbeat settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Stream reconnection and backoff settings.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    /// Outbound request rate limits.
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Data cache TTLs and capacity.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Risk gate limits.
    #[serde(default)]
    pub risk: RiskConfig,

    /// Execution retry and deadline settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Route selector scoring weights.
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Position stop/take/hold parameters.
    #[serde(default)]
    pub position: PositionConfig,

    /// Signal-to-order sizing.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation
    /// fails (e.g. a zero window or an out-of-range percentage).
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        for url in &self.sources.ws_urls {
            url::Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                field: "ws_urls",
                reason: format!("{url}: {e}"),
            })?;
        }
        if !self.sources.facts_api_url.is_empty() {
            url::Url::parse(&self.sources.facts_api_url).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "facts_api_url",
                    reason: e.to_string(),
                }
            })?;
        }

        if self.pool.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.pool.pong_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pong_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.reconnection.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_delay_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.max_delay_ms < self.reconnection.initial_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_delay_ms",
                reason: "must be >= initial_delay_ms".to_string(),
            }
            .into());
        }
        if self.reconnection.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }
        if self.reconnection.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.limiter.window_ms == 0 || self.limiter.drain_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limiter",
                reason: "window_ms and drain_interval_ms must be greater than 0".to_string(),
            }
            .into());
        }
        if self.limiter.market_data_limit == 0
            || self.limiter.trading_limit == 0
            || self.limiter.facts_limit == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "limiter",
                reason: "per-class limits must be greater than 0".to_string(),
            }
            .into());
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_entries",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.risk.daily_loss_limit <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "daily_loss_limit",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.risk.max_open_positions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_open_positions",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.execution.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.execution.slippage_multiplier < Decimal::ONE {
            return Err(ConfigError::InvalidValue {
                field: "slippage_multiplier",
                reason: "must be >= 1".to_string(),
            }
            .into());
        }
        if self.execution.slippage_ceiling <= Decimal::ZERO
            || self.execution.slippage_ceiling > Decimal::ONE
        {
            return Err(ConfigError::InvalidValue {
                field: "slippage_ceiling",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }

        if self.position.stop_loss_pct <= Decimal::ZERO
            || self.position.stop_loss_pct >= Decimal::ONE
        {
            return Err(ConfigError::InvalidValue {
                field: "stop_loss_pct",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }
        if self.position.take_profit_pct <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "take_profit_pct",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.position.max_hold_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_hold_minutes",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.pipeline.notional <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "notional",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
