use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Stream connection errors surfaced by the connection pool.
///
/// Reconnection with backoff is handled internally; these variants only
/// reach subscribers once the pool has given up or the request was invalid.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("connect to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("connection to {url} gave up after {attempts} attempts")]
    AttemptsExhausted { url: String, attempts: u32 },

    #[error("heartbeat to {url} unanswered within {timeout_ms}ms")]
    HeartbeatTimeout { url: String, timeout_ms: u64 },

    #[error("no active connection for {url}")]
    NotConnected { url: String },
}

/// Risk gate rejections.
///
/// Every variant is a final, machine-readable policy decision; the gate
/// never retries internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("cooldown active until {until}")]
    CooldownActive { until: chrono::DateTime<chrono::Utc> },

    #[error("daily loss limit breached: {daily_pnl} <= -{limit}")]
    DailyLossLimit { daily_pnl: Decimal, limit: Decimal },

    #[error("open position ceiling reached: {open} >= {max}")]
    PositionCeiling { open: usize, max: usize },

    #[error("allocation exceeded for strategy '{strategy}': {current} + {requested} > {limit}")]
    AllocationExceeded {
        strategy: String,
        current: Decimal,
        requested: Decimal,
        limit: Decimal,
    },
}

/// Execution-related errors with structured variants.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("no viable route for {instrument}")]
    RouteNotFound { instrument: String },

    #[error("venue '{venue}' swap failed: {reason}")]
    SwapFailed { venue: String, reason: String },

    #[error("venue '{venue}' call exceeded {deadline_ms}ms deadline")]
    Timeout { venue: String, deadline_ms: u64 },

    #[error("fill for {signature} not confirmed within {deadline_ms}ms")]
    ConfirmationTimeout { signature: String, deadline_ms: u64 },

    #[error("order {order_id} is terminal in state {state}")]
    Terminal { order_id: String, state: String },

    #[error("illegal transition {from} -> {to} for order {order_id}")]
    IllegalTransition {
        order_id: String,
        from: String,
        to: String,
    },
}

impl ExecutionError {
    /// Whether the execution retry loop may reattempt after this error.
    ///
    /// Route absence and state-machine violations are final; venue failures
    /// and timeouts are retried until the attempt budget is spent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SwapFailed { .. } | Self::Timeout { .. } | Self::ConfirmationTimeout { .. }
        )
    }

    /// Whether this error counts as a timeout for terminal-state purposes.
    ///
    /// An unconfirmed fill is treated the same as a stalled venue call.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConfirmationTimeout { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}
