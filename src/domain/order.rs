//! Order intent and the forward-only order state machine data.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::ExecutionError;

use super::id::{InstrumentId, OrderId, VenueId};
use super::signal::{Signal, Urgency};

/// A request to trade, produced from an approved [`Signal`].
///
/// Intents are what the risk gate evaluates; an [`Order`] only exists once
/// the gate has approved the intent.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    signal: Signal,
    strategy: String,
    notional: Decimal,
    slippage_tolerance: Decimal,
}

impl OrderIntent {
    /// Create a new order intent.
    #[must_use]
    pub fn new(
        signal: Signal,
        strategy: impl Into<String>,
        notional: Decimal,
        slippage_tolerance: Decimal,
    ) -> Self {
        Self {
            signal,
            strategy: strategy.into(),
            notional,
            slippage_tolerance,
        }
    }

    /// The originating signal.
    #[must_use]
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Strategy name this intent is attributed to (for allocation limits).
    #[must_use]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Instrument being traded.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        self.signal.instrument()
    }

    /// Requested notional size.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.notional
    }

    /// Initial slippage tolerance (fraction, e.g. 0.01 = 1%).
    #[must_use]
    pub fn slippage_tolerance(&self) -> Decimal {
        self.slippage_tolerance
    }

    /// Urgency inherited from the signal.
    #[must_use]
    pub fn urgency(&self) -> Urgency {
        self.signal.urgency()
    }
}

/// Order lifecycle states.
///
/// Transitions are strictly forward except the retry loop
/// (`Executing | Confirming -> RetryScheduled -> Routing`). `Completed`,
/// `Failed` and `TimedOut` are terminal and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Routing,
    Executing,
    Confirming,
    RetryScheduled,
    Completed,
    Failed,
    TimedOut,
}

impl OrderStatus {
    /// Returns true if no further transitions are allowed from this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Whether moving to `next` is a legal edge of the state machine.
    #[must_use]
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::{
            Completed, Confirming, Executing, Failed, Pending, RetryScheduled, Routing, TimedOut,
        };
        matches!(
            (self, next),
            (Pending, Routing)
                | (Routing, Executing)
                | (Routing, Failed)
                | (Executing, Confirming)
                | (Executing, RetryScheduled)
                | (Executing, Failed)
                | (Executing, TimedOut)
                | (Confirming, Completed)
                | (Confirming, RetryScheduled)
                | (Confirming, Failed)
                | (Confirming, TimedOut)
                | (RetryScheduled, Routing)
        )
    }

    /// Static name used in logs and lifecycle events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Routing => "routing",
            Self::Executing => "executing",
            Self::Confirming => "confirming",
            Self::RetryScheduled => "retry_scheduled",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timeout",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order moving through the execution state machine.
///
/// All status changes go through [`transition`](Order::transition), which
/// enforces the legal edges; attempt counting and error accumulation are
/// owned by the state machine driver.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    intent: OrderIntent,
    venue: Option<VenueId>,
    slippage_tolerance: Decimal,
    status: OrderStatus,
    attempts: u32,
    errors: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a pending order from an approved intent.
    #[must_use]
    pub fn from_intent(intent: OrderIntent) -> Self {
        let now = Utc::now();
        let slippage_tolerance = intent.slippage_tolerance();
        Self {
            id: OrderId::generate(),
            intent,
            venue: None,
            slippage_tolerance,
            status: OrderStatus::Pending,
            attempts: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the order ID.
    #[must_use]
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    /// The intent this order was created from.
    #[must_use]
    pub fn intent(&self) -> &OrderIntent {
        &self.intent
    }

    /// Instrument being traded.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        self.intent.instrument()
    }

    /// Venue selected by routing, if any yet.
    #[must_use]
    pub fn venue(&self) -> Option<&VenueId> {
        self.venue.as_ref()
    }

    /// Record the venue selected for the current attempt.
    pub fn set_venue(&mut self, venue: VenueId) {
        self.venue = Some(venue);
    }

    /// Current slippage tolerance (escalates across retries).
    #[must_use]
    pub fn slippage_tolerance(&self) -> Decimal {
        self.slippage_tolerance
    }

    /// Widen the slippage tolerance, clamped to `ceiling`.
    pub fn escalate_slippage(&mut self, multiplier: Decimal, ceiling: Decimal) {
        self.slippage_tolerance = (self.slippage_tolerance * multiplier).min(ceiling);
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Attempts made so far (entries into `Executing`).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Bump the attempt counter.
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Accumulated per-attempt error descriptions.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Append an error description for the current attempt.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// When the order was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last transition time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move to `next`, enforcing the legal edges.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Terminal`] if the order is already in a
    /// terminal state, or [`ExecutionError::IllegalTransition`] for any
    /// other illegal edge.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), ExecutionError> {
        if self.status.is_terminal() {
            return Err(ExecutionError::Terminal {
                order_id: self.id.to_string(),
                state: self.status.to_string(),
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(ExecutionError::IllegalTransition {
                order_id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Signal;
    use rust_decimal_macros::dec;

    fn intent() -> OrderIntent {
        let signal = Signal::new(
            "surge",
            InstrumentId::new("mint-1"),
            dec!(0.7),
            Urgency::Normal,
        );
        OrderIntent::new(signal, "momentum", dec!(100), dec!(0.01))
    }

    #[test]
    fn order_starts_pending_with_intent_slippage() {
        let order = Order::from_intent(intent());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.slippage_tolerance(), dec!(0.01));
        assert_eq!(order.attempts(), 0);
        assert!(order.errors().is_empty());
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        let mut order = Order::from_intent(intent());
        order.transition(OrderStatus::Routing).unwrap();
        order.transition(OrderStatus::Executing).unwrap();
        order.transition(OrderStatus::Confirming).unwrap();
        order.transition(OrderStatus::Completed).unwrap();
        assert!(order.status().is_terminal());
    }

    #[test]
    fn retry_loop_is_the_only_back_edge() {
        let mut order = Order::from_intent(intent());
        order.transition(OrderStatus::Routing).unwrap();
        order.transition(OrderStatus::Executing).unwrap();
        order.transition(OrderStatus::RetryScheduled).unwrap();
        order.transition(OrderStatus::Routing).unwrap();
        assert_eq!(order.status(), OrderStatus::Routing);
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut order = Order::from_intent(intent());
        order.transition(OrderStatus::Routing).unwrap();
        order.transition(OrderStatus::Failed).unwrap();

        let err = order.transition(OrderStatus::Routing).unwrap_err();
        assert!(matches!(err, ExecutionError::Terminal { .. }));
    }

    #[test]
    fn backwards_transition_rejected() {
        let mut order = Order::from_intent(intent());
        order.transition(OrderStatus::Routing).unwrap();
        order.transition(OrderStatus::Executing).unwrap();

        let err = order.transition(OrderStatus::Routing).unwrap_err();
        assert!(matches!(err, ExecutionError::IllegalTransition { .. }));
    }

    #[test]
    fn slippage_escalation_clamps_at_ceiling() {
        let mut order = Order::from_intent(intent());
        order.escalate_slippage(dec!(1.5), dec!(0.02));
        assert_eq!(order.slippage_tolerance(), dec!(0.015));
        order.escalate_slippage(dec!(1.5), dec!(0.02));
        assert_eq!(order.slippage_tolerance(), dec!(0.02));
    }

    #[test]
    fn errors_accumulate() {
        let mut order = Order::from_intent(intent());
        order.record_error("attempt 1: swap failed");
        order.record_error("attempt 2: timeout");
        assert_eq!(order.errors().len(), 2);
    }
}
