//! Position ledger: the single owner of position and risk state.
//!
//! All mutation happens under one lock, so a gate decision and the
//! position change it authorizes are linearizable. Fills open positions
//! with derived stop-loss, take-profit and max-hold exits; price ticks
//! mark open positions and fire those exits.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{PositionConfig, RiskConfig};
use crate::domain::{
    CloseReason, InstrumentId, LifecycleEvent, Order, OrderIntent, Position, PositionBook,
    PositionId, RiskState,
};
use crate::error::{Error, Result};
use crate::port::Fill;

use super::events::EventBus;
use super::metrics::MetricsRecorder;
use super::risk_gate::{GateResult, RiskGate};

/// Strategy attribution for one position, kept so closes release the
/// same allocation the open reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Attribution {
    strategy: String,
    notional: Decimal,
}

/// Everything the ledger persists across restarts.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LedgerState {
    book: PositionBook,
    risk: RiskState,
    attributions: HashMap<u64, Attribution>,
}

impl LedgerState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            book: PositionBook::new(),
            risk: RiskState::new(),
            attributions: HashMap::new(),
        }
    }

    /// Count of open positions in this state.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.book.open_count()
    }

    /// Risk accounting carried in this state.
    #[must_use]
    pub fn risk(&self) -> &RiskState {
        &self.risk
    }
}

/// A position closed by a tick, as reported to the caller.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position_id: PositionId,
    pub reason: CloseReason,
    pub realized_pnl: Decimal,
}

pub struct PositionLedger {
    state: Mutex<LedgerState>,
    gate: RiskGate,
    risk_config: RiskConfig,
    position_config: PositionConfig,
    bus: EventBus,
    metrics: MetricsRecorder,
}

impl PositionLedger {
    #[must_use]
    pub fn new(
        risk_config: RiskConfig,
        position_config: PositionConfig,
        bus: EventBus,
        metrics: MetricsRecorder,
    ) -> Self {
        Self::with_state(LedgerState::new(), risk_config, position_config, bus, metrics)
    }

    /// Resume from a persisted state.
    #[must_use]
    pub fn with_state(
        state: LedgerState,
        risk_config: RiskConfig,
        position_config: PositionConfig,
        bus: EventBus,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            gate: RiskGate::new(risk_config.clone()),
            risk_config,
            position_config,
            bus,
            metrics,
        }
    }

    /// Evaluate an intent against current risk state, under the ledger
    /// lock so the decision cannot race a concurrent open or close.
    #[must_use]
    pub fn check_intent(&self, intent: &OrderIntent, now: DateTime<Utc>) -> GateResult {
        let mut state = self.state.lock();
        state.risk.roll_day(now);
        self.gate.approve(intent, &state.risk, now)
    }

    /// Open a position from a confirmed fill.
    ///
    /// Exit levels derive from the entry price: stop at
    /// `entry * (1 - stop_loss_pct)`, take at `entry * (1 + take_profit_pct)`,
    /// forced close at `now + max_hold_minutes`.
    pub fn on_fill(&self, order: &Order, fill: &Fill, now: DateTime<Utc>) -> PositionId {
        let entry = fill.price();
        let stop_loss = entry * (Decimal::ONE - self.position_config.stop_loss_pct);
        let take_profit = entry * (Decimal::ONE + self.position_config.take_profit_pct);
        let max_hold_until = now + Duration::minutes(self.position_config.max_hold_minutes);

        let mut state = self.state.lock();
        let id = state.book.next_id();
        let position = Position::open(
            id,
            order.id().clone(),
            fill.instrument().clone(),
            entry,
            fill.quantity(),
            fill.fee(),
            stop_loss,
            take_profit,
            max_hold_until,
        );
        info!(
            position_id = %id,
            instrument = %fill.instrument(),
            entry = %entry,
            stop_loss = %stop_loss,
            take_profit = %take_profit,
            "Position opened"
        );
        state.book.add(position);
        state
            .risk
            .record_open(order.intent().strategy(), order.intent().notional());
        state.attributions.insert(
            id.value(),
            Attribution {
                strategy: order.intent().strategy().to_string(),
                notional: order.intent().notional(),
            },
        );
        drop(state);

        self.metrics.position_opened();
        self.bus.publish(LifecycleEvent::PositionOpened {
            position_id: id,
            instrument: fill.instrument().clone(),
            entry_price: entry,
            quantity: fill.quantity(),
            at: now,
        });
        id
    }

    /// Mark open positions on `instrument` and fire any exit triggers.
    ///
    /// Returns the positions the tick closed, in book order.
    pub fn on_tick(
        &self,
        instrument: &InstrumentId,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Vec<ClosedPosition> {
        let exit_fee = self.position_config.exit_fee_estimate;
        let mut closed = Vec::new();

        let mut state = self.state.lock();
        let mut triggered = Vec::new();
        for position in state.book.open_on_instrument(instrument) {
            position.mark(price, exit_fee);
            if let Some(reason) = position.exit_trigger(price, now) {
                triggered.push((position.id(), reason));
            }
        }
        for (id, reason) in triggered {
            if let Some(result) = self.close_locked(&mut state, id, reason, price, now) {
                closed.push(result);
            }
        }
        drop(state);

        for c in &closed {
            self.metrics.position_closed();
            self.bus.publish(LifecycleEvent::PositionClosed {
                position_id: c.position_id,
                instrument: instrument.clone(),
                exit_price: price,
                realized_pnl: c.realized_pnl,
                reason: c.reason.as_str(),
                at: now,
            });
        }
        closed
    }

    /// Close one position at the given price, outside any trigger.
    ///
    /// Returns the realized pnl, or `None` if the position is unknown or
    /// already closed.
    pub fn close_manual(
        &self,
        id: PositionId,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<Decimal> {
        let mut state = self.state.lock();
        let closed = self.close_locked(&mut state, id, CloseReason::Manual, price, now)?;
        let instrument = state.book.get(id)?.instrument().clone();
        drop(state);

        self.metrics.position_closed();
        self.bus.publish(LifecycleEvent::PositionClosed {
            position_id: id,
            instrument,
            exit_price: price,
            realized_pnl: closed.realized_pnl,
            reason: CloseReason::Manual.as_str(),
            at: now,
        });
        Some(closed.realized_pnl)
    }

    fn close_locked(
        &self,
        state: &mut LedgerState,
        id: PositionId,
        reason: CloseReason,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<ClosedPosition> {
        let exit_fee = self.position_config.exit_fee_estimate;
        let position = state.book.get_mut(id)?;
        if !position.is_open() {
            debug!(position_id = %id, "Close skipped: already closed");
            return None;
        }
        let realized = position.close(reason, price, exit_fee);

        let attribution = state.attributions.remove(&id.value());
        match attribution {
            Some(attr) => state.risk.record_close(
                &attr.strategy,
                attr.notional,
                realized,
                now,
                self.risk_config.loss_streak_threshold,
                Duration::minutes(self.risk_config.cooldown_minutes),
            ),
            // Positions restored from an older snapshot may lack one.
            None => {
                warn!(position_id = %id, "No strategy attribution for closed position");
                state.risk.record_close(
                    "",
                    Decimal::ZERO,
                    realized,
                    now,
                    self.risk_config.loss_streak_threshold,
                    Duration::minutes(self.risk_config.cooldown_minutes),
                );
            }
        }
        info!(
            position_id = %id,
            reason = reason.as_str(),
            exit = %price,
            realized = %realized,
            "Position closed"
        );
        Some(ClosedPosition {
            position_id: id,
            reason,
            realized_pnl: realized,
        })
    }

    /// Count of open positions.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().book.open_count()
    }

    /// Sum of entry values across open positions.
    #[must_use]
    pub fn total_exposure(&self) -> Decimal {
        self.state.lock().book.total_exposure()
    }

    /// Pnl realized so far today.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.state.lock().risk.daily_pnl()
    }

    /// Run `f` against one position, if it exists.
    pub fn with_position<T>(&self, id: PositionId, f: impl FnOnce(&Position) -> T) -> Option<T> {
        self.state.lock().book.get(id).map(f)
    }

    /// Persist the full ledger state through `store`.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the atomic file swap fails.
    pub fn persist(&self, store: &SnapshotStore) -> Result<()> {
        let state = self.state.lock();
        store.save(&state)
    }
}

/// Crash-safe JSON persistence for [`LedgerState`].
///
/// Writes go to a sibling temp file first and are renamed into place, so
/// a torn write never corrupts the previous snapshot.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically write `state` to disk.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or any filesystem step fails.
    pub fn save(&self, state: &LedgerState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state).map_err(|err| self.snapshot_error(&err))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json).map_err(|err| self.snapshot_error(&err))?;
        fs::rename(&tmp, &self.path)
            .map_err(|err| self.snapshot_error(&err))?;
        debug!(path = %self.path.display(), bytes = json.len(), "Wrote ledger snapshot");
        Ok(())
    }

    /// Load the last snapshot, or `None` when no snapshot exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<LedgerState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.snapshot_error(&err)),
        };
        let state =
            serde_json::from_slice(&bytes).map_err(|err| self.snapshot_error(&err))?;
        Ok(Some(state))
    }

    /// Fold any underlying failure into one variant carrying the path, so
    /// a broken snapshot file is distinguishable from other IO or JSON
    /// failures in the pipeline.
    fn snapshot_error(&self, err: &dyn std::fmt::Display) -> Error {
        Error::Snapshot(format!("{}: {err}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderIntent, Signal, Urgency, VenueId};
    use rust_decimal_macros::dec;

    fn ledger() -> PositionLedger {
        PositionLedger::new(
            RiskConfig {
                daily_loss_limit: dec!(100),
                max_open_positions: 5,
                loss_streak_threshold: 2,
                cooldown_minutes: 30,
                strategy_allocations: HashMap::new(),
                default_allocation: dec!(1000),
            },
            PositionConfig {
                stop_loss_pct: dec!(0.15),
                take_profit_pct: dec!(0.30),
                max_hold_minutes: 60,
                exit_fee_estimate: dec!(0),
            },
            EventBus::new(64),
            MetricsRecorder::default(),
        )
    }

    fn order(notional: Decimal) -> Order {
        let signal = Signal::new(
            "surge",
            InstrumentId::new("mint-1"),
            dec!(0.8),
            Urgency::Normal,
        );
        Order::from_intent(OrderIntent::new(signal, "momentum", notional, dec!(0.01)))
    }

    fn fill(price: Decimal, quantity: Decimal) -> Fill {
        Fill::new(
            "sig-1",
            VenueId::new("jup"),
            InstrumentId::new("mint-1"),
            price,
            quantity,
            dec!(0),
        )
    }

    #[test]
    fn fill_opens_position_with_derived_exits() {
        let ledger = ledger();
        let now = Utc::now();
        let id = ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);

        assert_eq!(ledger.open_count(), 1);
        let (stop, take) = ledger
            .with_position(id, |p| (p.stop_loss(), p.take_profit()))
            .unwrap();
        assert_eq!(stop, dec!(0.8500));
        assert_eq!(take, dec!(1.3000));
    }

    #[test]
    fn tick_above_stop_only_marks() {
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");
        let id = ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);

        let closed = ledger.on_tick(&instrument, dec!(0.95), now);
        assert!(closed.is_empty());
        let unrealized = ledger.with_position(id, Position::unrealized_pnl).unwrap();
        assert_eq!(unrealized, dec!(-5.00));
    }

    #[test]
    fn stop_loss_tick_closes_at_observed_price() {
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");
        ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);

        // 0.95 stays above the 0.85 stop, 0.84 crosses it.
        assert!(ledger.on_tick(&instrument, dec!(0.95), now).is_empty());
        let closed = ledger.on_tick(&instrument, dec!(0.84), now);

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].reason, CloseReason::StopLoss);
        assert_eq!(closed[0].realized_pnl, dec!(-16.00));
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.daily_pnl(), dec!(-16.00));
    }

    #[test]
    fn take_profit_tick_closes() {
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");
        ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);

        let closed = ledger.on_tick(&instrument, dec!(1.31), now);
        assert_eq!(closed[0].reason, CloseReason::TakeProfit);
        assert_eq!(closed[0].realized_pnl, dec!(31.00));
    }

    #[test]
    fn max_hold_expiry_forces_close() {
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");
        ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);

        let later = now + Duration::minutes(61);
        let closed = ledger.on_tick(&instrument, dec!(1.05), later);
        assert_eq!(closed[0].reason, CloseReason::MaxHold);
    }

    #[test]
    fn loss_streak_arms_cooldown_and_gate_rejects() {
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");

        for _ in 0..2 {
            ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);
            ledger.on_tick(&instrument, dec!(0.84), now);
        }

        let signal = Signal::new("surge", instrument, dec!(0.9), Urgency::Normal);
        let intent = OrderIntent::new(signal, "momentum", dec!(50), dec!(0.01));
        let result = ledger.check_intent(&intent, now);
        assert!(!result.is_approved());
        assert!(matches!(
            result.reasons()[0],
            crate::error::RiskError::CooldownActive { .. }
        ));
    }

    #[test]
    fn close_releases_strategy_allocation() {
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");
        ledger.on_fill(&order(dec!(900)), &fill(dec!(1.00), dec!(100)), now);

        // 900 of the 1000 default allocation is reserved.
        let signal = Signal::new("surge", instrument.clone(), dec!(0.9), Urgency::Normal);
        let intent = OrderIntent::new(signal, "momentum", dec!(200), dec!(0.01));
        assert!(!ledger.check_intent(&intent, now).is_approved());

        ledger.on_tick(&instrument, dec!(1.31), now);
        assert!(ledger.check_intent(&intent, now).is_approved());
    }

    #[test]
    fn manual_close_returns_realized() {
        let ledger = ledger();
        let now = Utc::now();
        let id = ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);

        let realized = ledger.close_manual(id, dec!(1.10), now);
        assert_eq!(realized, Some(dec!(10.00)));
        assert_eq!(ledger.close_manual(id, dec!(1.10), now), None);
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("ledger.json"));
        let ledger = ledger();
        let now = Utc::now();
        let instrument = InstrumentId::new("mint-1");
        ledger.on_fill(&order(dec!(100)), &fill(dec!(1.00), dec!(100)), now);
        ledger.on_tick(&instrument, dec!(0.84), now);
        ledger.on_fill(&order(dec!(100)), &fill(dec!(2.00), dec!(50)), now);
        ledger.persist(&store).unwrap();

        let restored = store.load().unwrap().unwrap();
        assert_eq!(restored.book.open_count(), 1);
        assert_eq!(restored.risk.daily_pnl(), dec!(-16.00));
        assert_eq!(restored.attributions.len(), 1);
    }

    #[test]
    fn load_missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_surfaces_a_snapshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"not json").unwrap();

        match SnapshotStore::new(path).load() {
            Err(Error::Snapshot(message)) => assert!(message.contains("ledger.json")),
            Err(_) => panic!("wrong error variant"),
            Ok(_) => panic!("parsed a corrupt snapshot"),
        }
    }
}
