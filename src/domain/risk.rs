//! Process-wide risk accounting state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mutable risk accounting shared between the risk gate and the ledger.
///
/// Mutated only under the ledger lock so that every change is linearizable
/// with respect to risk checks. Daily pnl resets on the UTC day boundary;
/// the cooldown is monotonic — closing a winner never shortens it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    day: NaiveDate,
    daily_pnl: Decimal,
    open_positions: usize,
    consecutive_losses: u32,
    cooldown_until: Option<DateTime<Utc>>,
    strategy_exposure: HashMap<String, Decimal>,
}

impl RiskState {
    /// Fresh state for the current UTC day.
    #[must_use]
    pub fn new() -> Self {
        Self {
            day: Utc::now().date_naive(),
            daily_pnl: Decimal::ZERO,
            open_positions: 0,
            consecutive_losses: 0,
            cooldown_until: None,
            strategy_exposure: HashMap::new(),
        }
    }

    /// Pnl realized so far today.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    /// Number of currently open positions.
    #[must_use]
    pub fn open_positions(&self) -> usize {
        self.open_positions
    }

    /// Current consecutive-loss streak.
    #[must_use]
    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    /// Cooldown deadline, if one is armed.
    #[must_use]
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    /// Whether the cooldown is active at `now`.
    #[must_use]
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Exposure currently attributed to `strategy`.
    #[must_use]
    pub fn strategy_exposure(&self, strategy: &str) -> Decimal {
        self.strategy_exposure
            .get(strategy)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Roll the daily pnl if `now` is on a new UTC day.
    pub fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            self.day = today;
            self.daily_pnl = Decimal::ZERO;
        }
    }

    /// Account for a newly opened position.
    pub fn record_open(&mut self, strategy: &str, notional: Decimal) {
        self.open_positions += 1;
        *self
            .strategy_exposure
            .entry(strategy.to_string())
            .or_insert(Decimal::ZERO) += notional;
    }

    /// Account for a closed position.
    ///
    /// Updates daily pnl (after the day-boundary roll), the loss streak,
    /// and arms the cooldown once the streak reaches `loss_streak_threshold`.
    pub fn record_close(
        &mut self,
        strategy: &str,
        notional: Decimal,
        realized_pnl: Decimal,
        now: DateTime<Utc>,
        loss_streak_threshold: u32,
        cooldown: chrono::Duration,
    ) {
        self.roll_day(now);
        self.daily_pnl += realized_pnl;
        self.open_positions = self.open_positions.saturating_sub(1);

        if let Some(exposure) = self.strategy_exposure.get_mut(strategy) {
            *exposure = (*exposure - notional).max(Decimal::ZERO);
        }

        if realized_pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
            if self.consecutive_losses >= loss_streak_threshold {
                let until = now + cooldown;
                // Monotonic: never shorten an already-armed cooldown.
                if self.cooldown_until.map_or(true, |current| until > current) {
                    self.cooldown_until = Some(until);
                }
            }
        } else {
            self.consecutive_losses = 0;
        }
    }
}

impl Default for RiskState {
    fn default() -> Self {
        Self::new()
    }
}
