//! Pre-trade risk checks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::RiskConfig;
use crate::domain::{OrderIntent, RiskState};
use crate::error::RiskError;

/// Outcome of a gate evaluation.
///
/// Rejections are final policy decisions; the gate never retries. Checks
/// short-circuit, so a rejection carries the first limit that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum GateResult {
    Approved,
    Rejected { reasons: Vec<RiskError> },
}

impl GateResult {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Structured rejection reasons; empty when approved.
    #[must_use]
    pub fn reasons(&self) -> &[RiskError] {
        match self {
            Self::Approved => &[],
            Self::Rejected { reasons } => reasons,
        }
    }

    fn rejected(reason: RiskError) -> Self {
        Self::Rejected {
            reasons: vec![reason],
        }
    }
}

/// Deterministic pre-trade gate.
///
/// Checks run in a fixed order — cooldown, daily loss limit, open-position
/// ceiling, per-strategy allocation — and the first failure wins. The gate
/// holds no mutable state of its own; callers evaluate it against a
/// [`RiskState`] under the ledger lock so decisions are linearizable with
/// position mutations.
#[derive(Clone)]
pub struct RiskGate {
    config: RiskConfig,
}

impl RiskGate {
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Evaluate `intent` against the current risk state.
    #[must_use]
    pub fn approve(&self, intent: &OrderIntent, state: &RiskState, now: DateTime<Utc>) -> GateResult {
        if state.in_cooldown(now) {
            // in_cooldown is only true when the deadline is set
            let until = state.cooldown_until().unwrap_or(now);
            debug!(strategy = intent.strategy(), until = %until, "Intent rejected: cooldown");
            return GateResult::rejected(RiskError::CooldownActive { until });
        }

        if state.daily_pnl() <= -self.config.daily_loss_limit {
            debug!(
                daily_pnl = %state.daily_pnl(),
                limit = %self.config.daily_loss_limit,
                "Intent rejected: daily loss limit"
            );
            return GateResult::rejected(RiskError::DailyLossLimit {
                daily_pnl: state.daily_pnl(),
                limit: self.config.daily_loss_limit,
            });
        }

        if state.open_positions() >= self.config.max_open_positions {
            debug!(
                open = state.open_positions(),
                max = self.config.max_open_positions,
                "Intent rejected: position ceiling"
            );
            return GateResult::rejected(RiskError::PositionCeiling {
                open: state.open_positions(),
                max: self.config.max_open_positions,
            });
        }

        let current = state.strategy_exposure(intent.strategy());
        let limit = self.config.allocation_for(intent.strategy());
        if current + intent.notional() > limit {
            debug!(
                strategy = intent.strategy(),
                current = %current,
                requested = %intent.notional(),
                limit = %limit,
                "Intent rejected: allocation exceeded"
            );
            return GateResult::rejected(RiskError::AllocationExceeded {
                strategy: intent.strategy().to_string(),
                current,
                requested: intent.notional(),
                limit,
            });
        }

        GateResult::Approved
    }

    /// Daily loss limit this gate enforces.
    #[must_use]
    pub fn daily_loss_limit(&self) -> Decimal {
        self.config.daily_loss_limit
    }
}
