//! Canonical market events and pipeline lifecycle events.
//!
//! Provider payloads arrive in heterogeneous shapes; the
//! [`EventRouter`](crate::infrastructure::router::EventRouter) normalizes
//! them into [`MarketEvent`] before fan-out. Lifecycle events are the
//! outbound publish surface consumed by observers (dashboards, logs).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::id::{InstrumentId, OrderId, PositionId};

/// Canonical event kinds used as router topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PriceTick,
    Surge,
    WhaleActivity,
    FeeUpdate,
}

/// A normalized market event.
///
/// All events for the same instrument are delivered to a given subscriber
/// in arrival order; ordering across instruments is not guaranteed.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// Price update for an instrument.
    PriceTick {
        instrument: InstrumentId,
        price: Decimal,
        observed_at: DateTime<Utc>,
    },
    /// Volume/attention surge on an instrument (new-pairs style feeds).
    Surge {
        instrument: InstrumentId,
        volume: Decimal,
        observed_at: DateTime<Utc>,
    },
    /// Large-holder transaction on the instrument.
    WhaleActivity {
        instrument: InstrumentId,
        notional: Decimal,
        side: TradeSide,
        observed_at: DateTime<Utc>,
    },
    /// Network/venue fee level update.
    FeeUpdate {
        instrument: InstrumentId,
        fee: Decimal,
        observed_at: DateTime<Utc>,
    },
}

impl MarketEvent {
    /// The topic this event is routed on.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PriceTick { .. } => EventKind::PriceTick,
            Self::Surge { .. } => EventKind::Surge,
            Self::WhaleActivity { .. } => EventKind::WhaleActivity,
            Self::FeeUpdate { .. } => EventKind::FeeUpdate,
        }
    }

    /// Instrument the event refers to.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        match self {
            Self::PriceTick { instrument, .. }
            | Self::Surge { instrument, .. }
            | Self::WhaleActivity { instrument, .. }
            | Self::FeeUpdate { instrument, .. } => instrument,
        }
    }
}

/// Direction of an observed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Connection lifecycle states reported by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closed,
    /// Reconnection attempts exhausted; the pool will not retry further.
    Failed,
}

/// Pipeline lifecycle events published to observing collaborators.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    OrderStateChanged {
        order_id: OrderId,
        from: &'static str,
        to: &'static str,
        at: DateTime<Utc>,
    },
    PositionOpened {
        position_id: PositionId,
        instrument: InstrumentId,
        entry_price: Decimal,
        quantity: Decimal,
        at: DateTime<Utc>,
    },
    PositionClosed {
        position_id: PositionId,
        instrument: InstrumentId,
        exit_price: Decimal,
        realized_pnl: Decimal,
        reason: &'static str,
        at: DateTime<Utc>,
    },
    ConnectionStateChanged {
        url: String,
        state: ConnState,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn market_event_kind_matches_variant() {
        let tick = MarketEvent::PriceTick {
            instrument: InstrumentId::new("mint-1"),
            price: dec!(1.05),
            observed_at: Utc::now(),
        };
        assert_eq!(tick.kind(), EventKind::PriceTick);
        assert_eq!(tick.instrument().as_str(), "mint-1");
    }

    #[test]
    fn whale_event_carries_side() {
        let event = MarketEvent::WhaleActivity {
            instrument: InstrumentId::new("mint-2"),
            notional: dec!(25000),
            side: TradeSide::Buy,
            observed_at: Utc::now(),
        };
        assert_eq!(event.kind(), EventKind::WhaleActivity);
    }
}
