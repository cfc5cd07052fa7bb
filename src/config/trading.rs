//! Risk, execution, route selection, and position management configuration.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Risk gate configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Daily loss limit in quote currency. New orders are rejected once
    /// realized daily pnl reaches `-daily_loss_limit`.
    #[serde(default = "default_daily_loss_limit")]
    pub daily_loss_limit: Decimal,
    /// Maximum concurrently open positions.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Consecutive losing closes before the cooldown trips.
    #[serde(default = "default_loss_streak_threshold")]
    pub loss_streak_threshold: u32,
    /// Cooldown length once the loss streak trips (minutes).
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    /// Per-strategy notional allocation caps, keyed by strategy name.
    /// Strategies not listed fall back to `default_allocation`.
    #[serde(default)]
    pub strategy_allocations: HashMap<String, Decimal>,
    /// Allocation cap for strategies without an explicit entry.
    #[serde(default = "default_default_allocation")]
    pub default_allocation: Decimal,
}

fn default_daily_loss_limit() -> Decimal {
    Decimal::from(500)
}

const fn default_max_open_positions() -> usize {
    10
}

const fn default_loss_streak_threshold() -> u32 {
    3
}

const fn default_cooldown_minutes() -> i64 {
    30
}

fn default_default_allocation() -> Decimal {
    Decimal::from(1000)
}

impl RiskConfig {
    /// Allocation cap for `strategy`, falling back to the default cap.
    #[must_use]
    pub fn allocation_for(&self, strategy: &str) -> Decimal {
        self.strategy_allocations
            .get(strategy)
            .copied()
            .unwrap_or(self.default_allocation)
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: default_daily_loss_limit(),
            max_open_positions: default_max_open_positions(),
            loss_streak_threshold: default_loss_streak_threshold(),
            cooldown_minutes: default_cooldown_minutes(),
            strategy_allocations: HashMap::new(),
            default_allocation: default_default_allocation(),
        }
    }
}

/// Execution state machine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Attempts before an order fails terminally.
    #[serde(default = "default_exec_max_attempts")]
    pub max_attempts: u32,
    /// Extra attempts granted to high-urgency orders.
    #[serde(default = "default_urgent_extra_attempts")]
    pub urgent_extra_attempts: u32,
    /// Slippage tolerance multiplier applied on each retry.
    #[serde(default = "default_slippage_multiplier")]
    pub slippage_multiplier: Decimal,
    /// Hard ceiling for escalated slippage tolerance (e.g. 0.05 = 5%).
    #[serde(default = "default_slippage_ceiling")]
    pub slippage_ceiling: Decimal,
    /// Deadline for gathering a route quote from one venue (milliseconds).
    #[serde(default = "default_route_deadline_ms")]
    pub route_deadline_ms: u64,
    /// Deadline for swap submission (milliseconds).
    #[serde(default = "default_swap_deadline_ms")]
    pub swap_deadline_ms: u64,
    /// Deadline for swap confirmation (milliseconds).
    #[serde(default = "default_confirm_deadline_ms")]
    pub confirm_deadline_ms: u64,
    /// Pause between a scheduled retry and re-entering routing (milliseconds).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

const fn default_exec_max_attempts() -> u32 {
    3
}

const fn default_urgent_extra_attempts() -> u32 {
    1
}

fn default_slippage_multiplier() -> Decimal {
    Decimal::new(15, 1) // 1.5x
}

fn default_slippage_ceiling() -> Decimal {
    Decimal::new(5, 2) // 5%
}

const fn default_route_deadline_ms() -> u64 {
    2_000
}

const fn default_swap_deadline_ms() -> u64 {
    10_000
}

const fn default_confirm_deadline_ms() -> u64 {
    30_000
}

const fn default_retry_delay_ms() -> u64 {
    250
}

impl ExecutionConfig {
    /// Attempt budget for an order of the given urgency.
    #[must_use]
    pub fn attempts_for(&self, urgency: crate::domain::Urgency) -> u32 {
        match urgency {
            crate::domain::Urgency::High => self.max_attempts + self.urgent_extra_attempts,
            _ => self.max_attempts,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_exec_max_attempts(),
            urgent_extra_attempts: default_urgent_extra_attempts(),
            slippage_multiplier: default_slippage_multiplier(),
            slippage_ceiling: default_slippage_ceiling(),
            route_deadline_ms: default_route_deadline_ms(),
            swap_deadline_ms: default_swap_deadline_ms(),
            confirm_deadline_ms: default_confirm_deadline_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Route selector scoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Venues in descending preference order. Position drives both the
    /// preference weight and the first tie-break.
    #[serde(default)]
    pub venue_preference: Vec<String>,
    /// Weight of the venue-preference term.
    #[serde(default = "default_preference_weight")]
    pub preference_weight: Decimal,
    /// Weight of the normalized expected-output term.
    #[serde(default = "default_output_weight")]
    pub output_weight: Decimal,
    /// Penalty per percentage point of price impact.
    #[serde(default = "default_impact_penalty")]
    pub impact_penalty: Decimal,
    /// Bonus per liquidity source, up to `source_cap`.
    #[serde(default = "default_source_bonus")]
    pub source_bonus: Decimal,
    /// Liquidity sources counted toward the bonus.
    #[serde(default = "default_source_cap")]
    pub source_cap: u32,
    /// Candidates above this price impact are not viable (percent).
    #[serde(default = "default_max_price_impact_pct")]
    pub max_price_impact_pct: Decimal,
}

fn default_preference_weight() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

fn default_output_weight() -> Decimal {
    Decimal::from(10)
}

fn default_impact_penalty() -> Decimal {
    Decimal::new(2, 1) // 0.2 per percentage point
}

fn default_source_bonus() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

const fn default_source_cap() -> u32 {
    5
}

fn default_max_price_impact_pct() -> Decimal {
    Decimal::from(10)
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            venue_preference: Vec::new(),
            preference_weight: default_preference_weight(),
            output_weight: default_output_weight(),
            impact_penalty: default_impact_penalty(),
            source_bonus: default_source_bonus(),
            source_cap: default_source_cap(),
            max_price_impact_pct: default_max_price_impact_pct(),
        }
    }
}

/// Position management configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionConfig {
    /// Stop-loss distance below entry (e.g. 0.15 = 15%).
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Take-profit distance above entry (e.g. 0.30 = 30%).
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Maximum holding time before a forced close (minutes).
    #[serde(default = "default_max_hold_minutes")]
    pub max_hold_minutes: i64,
    /// Estimated exit fee used when marking unrealized pnl.
    #[serde(default = "default_exit_fee_estimate")]
    pub exit_fee_estimate: Decimal,
}

fn default_stop_loss_pct() -> Decimal {
    Decimal::new(15, 2) // 15%
}

fn default_take_profit_pct() -> Decimal {
    Decimal::new(30, 2) // 30%
}

const fn default_max_hold_minutes() -> i64 {
    60
}

fn default_exit_fee_estimate() -> Decimal {
    Decimal::ZERO
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_hold_minutes: default_max_hold_minutes(),
            exit_fee_estimate: default_exit_fee_estimate(),
        }
    }
}

/// Signal-to-order sizing configuration for the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Strategy name stamped on intents (drives allocation accounting).
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Notional per order in quote currency.
    #[serde(default = "default_notional")]
    pub notional: Decimal,
    /// Initial slippage tolerance for new orders (e.g. 0.01 = 1%).
    #[serde(default = "default_initial_slippage")]
    pub initial_slippage: Decimal,
    /// Minimum signal confidence to act on (0..=1).
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Decimal,
}

fn default_strategy() -> String {
    "default".into()
}

fn default_notional() -> Decimal {
    Decimal::from(100)
}

fn default_initial_slippage() -> Decimal {
    Decimal::new(1, 2) // 1%
}

fn default_min_confidence() -> Decimal {
    Decimal::new(6, 1) // 0.6
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            notional: default_notional(),
            initial_slippage: default_initial_slippage(),
            min_confidence: default_min_confidence(),
        }
    }
}
