//! Position tracking types and pnl math.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{InstrumentId, OrderId, PositionId};

/// Why a position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    MaxHold,
    Manual,
}

impl CloseReason {
    /// Static name used in logs and lifecycle events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::MaxHold => "max_hold",
            Self::Manual => "manual",
        }
    }
}

/// Status of a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed {
        reason: CloseReason,
        exit_price: Decimal,
        realized_pnl: Decimal,
        closed_at: DateTime<Utc>,
    },
}

impl PositionStatus {
    /// Returns true if the position is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, PositionStatus::Open)
    }

    /// Returns true if the position is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, PositionStatus::Closed { .. })
    }
}

/// A holding created from an order fill, tracked until exit.
///
/// Keeps a back-reference to the originating order for lookup only; the
/// order itself is owned by whoever drove the execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    order_id: OrderId,
    instrument: InstrumentId,
    entry_price: Decimal,
    quantity: Decimal,
    entry_fee: Decimal,
    stop_loss: Decimal,
    take_profit: Decimal,
    max_hold_until: DateTime<Utc>,
    opened_at: DateTime<Utc>,
    current_price: Decimal,
    unrealized_pnl: Decimal,
    status: PositionStatus,
}

impl Position {
    /// Open a new position.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: PositionId,
        order_id: OrderId,
        instrument: InstrumentId,
        entry_price: Decimal,
        quantity: Decimal,
        entry_fee: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        max_hold_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            instrument,
            entry_price,
            quantity,
            entry_fee,
            stop_loss,
            take_profit,
            max_hold_until,
            opened_at: Utc::now(),
            current_price: entry_price,
            unrealized_pnl: Decimal::ZERO - entry_fee,
            status: PositionStatus::Open,
        }
    }

    /// Get the position ID.
    #[must_use]
    pub fn id(&self) -> PositionId {
        self.id
    }

    /// Originating order (lookup only).
    #[must_use]
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Instrument held.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Entry price.
    #[must_use]
    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Quantity held.
    #[must_use]
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Entry value (price × quantity).
    #[must_use]
    pub fn entry_value(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Fee paid on entry.
    #[must_use]
    pub fn entry_fee(&self) -> Decimal {
        self.entry_fee
    }

    /// Stop-loss trigger price.
    #[must_use]
    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    /// Take-profit trigger price.
    #[must_use]
    pub fn take_profit(&self) -> Decimal {
        self.take_profit
    }

    /// Deadline after which the position is force-closed.
    #[must_use]
    pub fn max_hold_until(&self) -> DateTime<Utc> {
        self.max_hold_until
    }

    /// When the position was opened.
    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Most recent mark price.
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        self.current_price
    }

    /// Mark-to-market pnl net of fees, recomputed on every matching tick.
    #[must_use]
    pub fn unrealized_pnl(&self) -> Decimal {
        self.unrealized_pnl
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> &PositionStatus {
        &self.status
    }

    /// Returns true if the position is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Realized pnl, if closed.
    #[must_use]
    pub fn realized_pnl(&self) -> Option<Decimal> {
        match &self.status {
            PositionStatus::Closed { realized_pnl, .. } => Some(*realized_pnl),
            PositionStatus::Open => None,
        }
    }

    /// Update the mark price and recompute unrealized pnl net of
    /// `estimated_exit_fee`.
    pub fn mark(&mut self, price: Decimal, estimated_exit_fee: Decimal) {
        self.current_price = price;
        self.unrealized_pnl =
            price * self.quantity - self.entry_value() - self.entry_fee - estimated_exit_fee;
    }

    /// Which exit trigger, if any, the given price/time meets.
    ///
    /// Triggers are evaluated in priority order: stop-loss, take-profit,
    /// max-hold deadline.
    #[must_use]
    pub fn exit_trigger(&self, price: Decimal, now: DateTime<Utc>) -> Option<CloseReason> {
        if price <= self.stop_loss {
            Some(CloseReason::StopLoss)
        } else if price >= self.take_profit {
            Some(CloseReason::TakeProfit)
        } else if now >= self.max_hold_until {
            Some(CloseReason::MaxHold)
        } else {
            None
        }
    }

    /// Close the position, freezing realized pnl.
    ///
    /// Realized pnl is exactly `exit value - entry value - total fees`.
    pub fn close(&mut self, reason: CloseReason, exit_price: Decimal, exit_fee: Decimal) -> Decimal {
        let realized = exit_price * self.quantity - self.entry_value() - self.entry_fee - exit_fee;
        self.current_price = exit_price;
        self.status = PositionStatus::Closed {
            reason,
            exit_price,
            realized_pnl: realized,
            closed_at: Utc::now(),
        };
        realized
    }
}

/// Owns all open and closed positions.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PositionBook {
    positions: Vec<Position>,
    next_id: u64,
}

impl PositionBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            next_id: 1,
        }
    }

    /// Generate the next position ID and increment the counter.
    pub fn next_id(&mut self) -> PositionId {
        let id = PositionId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record a new position.
    pub fn add(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// Iterate over all open positions.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    /// Mutably iterate over open positions on one instrument.
    pub fn open_on_instrument(
        &mut self,
        instrument: &InstrumentId,
    ) -> impl Iterator<Item = &mut Position> + '_ {
        let instrument = instrument.clone();
        self.positions
            .iter_mut()
            .filter(move |p| p.is_open() && p.instrument() == &instrument)
    }

    /// Count of open positions.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open_positions().count()
    }

    /// Sum of entry values for open positions attributed to `strategy`
    /// is tracked by the ledger; the book only exposes raw exposure.
    #[must_use]
    pub fn total_exposure(&self) -> Decimal {
        self.open_positions()
            .map(Position::entry_value)
            .fold(Decimal::ZERO, |acc, v| acc + v)
    }

    /// Get a position by ID.
    #[must_use]
    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id() == id)
    }

    /// Get a mutable reference to a position by ID.
    pub fn get_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        self.positions.iter_mut().find(|p| p.id() == id)
    }

    /// All positions, open and closed, in insertion order.
    #[must_use]
    pub fn all(&self) -> &[Position] {
        &self.positions
    }
}
