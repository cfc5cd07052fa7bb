//! The order execution state machine.
//!
//! Drives an approved intent through `Pending -> Routing -> Executing ->
//! Confirming -> Completed`, retrying recoverable venue failures through
//! `RetryScheduled -> Routing` with escalating slippage until the attempt
//! budget is spent.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ExecutionConfig;
use crate::domain::{
    InstrumentId, LifecycleEvent, Order, OrderIntent, OrderStatus, RouteCandidate,
};
use crate::error::ExecutionError;
use crate::port::{ExecutionVenue, Fill};

use super::events::EventBus;
use super::metrics::MetricsRecorder;
use super::selector::RouteSelector;

/// Terminal result of driving one order.
#[derive(Debug)]
pub struct ExecutionOutcome {
    order: Order,
    fill: Option<Fill>,
}

impl ExecutionOutcome {
    /// The order in its terminal state.
    #[must_use]
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// The confirmed fill, present only when the order completed.
    #[must_use]
    pub fn fill(&self) -> Option<&Fill> {
        self.fill.as_ref()
    }

    /// Consume the outcome.
    #[must_use]
    pub fn into_parts(self) -> (Order, Option<Fill>) {
        (self.order, self.fill)
    }
}

pub struct ExecutionStateMachine {
    venues: Vec<Arc<dyn ExecutionVenue>>,
    selector: RouteSelector,
    config: ExecutionConfig,
    bus: EventBus,
    metrics: MetricsRecorder,
}

impl ExecutionStateMachine {
    #[must_use]
    pub fn new(
        venues: Vec<Arc<dyn ExecutionVenue>>,
        selector: RouteSelector,
        config: ExecutionConfig,
        bus: EventBus,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            venues,
            selector,
            config,
            bus,
            metrics,
        }
    }

    /// Drive `intent` to a terminal state.
    ///
    /// Always returns an outcome whose order is `Completed`, `Failed` or
    /// `TimedOut`.
    ///
    /// # Errors
    ///
    /// Only on an internal state machine violation, which indicates a bug
    /// rather than a venue condition.
    pub async fn execute(
        &self,
        intent: OrderIntent,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let budget = self.config.attempts_for(intent.urgency());
        let mut order = Order::from_intent(intent);
        info!(
            order_id = %order.id(),
            instrument = %order.instrument(),
            notional = %order.intent().notional(),
            budget,
            "Executing order"
        );

        loop {
            self.transition(&mut order, OrderStatus::Routing)?;
            let quotes = self
                .gather_routes(order.instrument(), order.intent().notional())
                .await;

            let Some(route) = self.selector.select(&quotes) else {
                let err = ExecutionError::RouteNotFound {
                    instrument: order.instrument().to_string(),
                };
                warn!(order_id = %order.id(), "{err}");
                order.record_error(err.to_string());
                return self.finish(order, OrderStatus::Failed, None);
            };
            order.set_venue(route.venue().clone());

            self.transition(&mut order, OrderStatus::Executing)?;
            order.record_attempt();
            let started = Instant::now();

            match self.attempt(&mut order, &route).await {
                Ok(fill) => {
                    self.metrics.record_execution_latency(started.elapsed());
                    info!(
                        order_id = %order.id(),
                        venue = %fill.venue(),
                        price = %fill.price(),
                        attempts = order.attempts(),
                        "Order filled"
                    );
                    return self.finish(order, OrderStatus::Completed, Some(fill));
                }
                Err(err) => {
                    order.record_error(err.to_string());
                    if err.is_recoverable() && order.attempts() < budget {
                        warn!(
                            order_id = %order.id(),
                            attempt = order.attempts(),
                            budget,
                            "Attempt failed, retrying: {err}"
                        );
                        self.transition(&mut order, OrderStatus::RetryScheduled)?;
                        self.metrics.retry();
                        order.escalate_slippage(
                            self.config.slippage_multiplier,
                            self.config.slippage_ceiling,
                        );
                        sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                        continue;
                    }
                    let terminal = if err.is_timeout() {
                        OrderStatus::TimedOut
                    } else {
                        OrderStatus::Failed
                    };
                    warn!(
                        order_id = %order.id(),
                        attempts = order.attempts(),
                        terminal = terminal.as_str(),
                        "Order abandoned: {err}"
                    );
                    return self.finish(order, terminal, None);
                }
            }
        }
    }

    /// Submit and confirm a swap on the selected venue.
    async fn attempt(
        &self,
        order: &mut Order,
        route: &RouteCandidate,
    ) -> Result<Fill, ExecutionError> {
        let venue = self
            .venues
            .iter()
            .find(|v| v.id() == route.venue())
            .ok_or_else(|| ExecutionError::RouteNotFound {
                instrument: route.instrument().to_string(),
            })?;

        let swap_deadline = Duration::from_millis(self.config.swap_deadline_ms);
        let receipt = timeout(
            swap_deadline,
            venue.execute_swap(route, order.slippage_tolerance()),
        )
        .await
        .map_err(|_| ExecutionError::Timeout {
            venue: route.venue().to_string(),
            deadline_ms: self.config.swap_deadline_ms,
        })??;

        self.transition(order, OrderStatus::Confirming)?;

        let confirm_deadline = Duration::from_millis(self.config.confirm_deadline_ms);
        timeout(confirm_deadline, venue.confirm(&receipt))
            .await
            .map_err(|_| ExecutionError::ConfirmationTimeout {
                signature: receipt.signature().to_string(),
                deadline_ms: self.config.confirm_deadline_ms,
            })?
    }

    /// Quote every registered venue concurrently, each under its own
    /// deadline. Venues that error or stall simply contribute no quote.
    async fn gather_routes(
        &self,
        instrument: &InstrumentId,
        notional: Decimal,
    ) -> Vec<RouteCandidate> {
        let deadline = Duration::from_millis(self.config.route_deadline_ms);
        let quotes = join_all(self.venues.iter().map(|venue| async move {
            match timeout(deadline, venue.get_route(instrument, notional)).await {
                Ok(Ok(route)) => Some(route),
                Ok(Err(err)) => {
                    debug!(venue = %venue.id(), "Quote unavailable: {err}");
                    None
                }
                Err(_) => {
                    debug!(venue = %venue.id(), deadline_ms = self.config.route_deadline_ms, "Quote timed out");
                    None
                }
            }
        }))
        .await;
        quotes.into_iter().flatten().collect()
    }

    fn transition(&self, order: &mut Order, next: OrderStatus) -> Result<(), ExecutionError> {
        let from = order.status().as_str();
        order.transition(next)?;
        self.bus.publish(LifecycleEvent::OrderStateChanged {
            order_id: order.id().clone(),
            from,
            to: next.as_str(),
            at: order.updated_at(),
        });
        Ok(())
    }

    fn finish(
        &self,
        mut order: Order,
        terminal: OrderStatus,
        fill: Option<Fill>,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        self.transition(&mut order, terminal)?;
        match terminal {
            OrderStatus::Completed => self.metrics.order_completed(),
            OrderStatus::TimedOut => self.metrics.order_timed_out(),
            _ => self.metrics.order_failed(),
        }
        Ok(ExecutionOutcome { order, fill })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::domain::{Signal, Urgency};
    use crate::testkit::ScriptedVenue;
    use rust_decimal_macros::dec;

    fn intent(urgency: Urgency) -> OrderIntent {
        let signal = Signal::new("surge", InstrumentId::new("mint-1"), dec!(0.8), urgency);
        OrderIntent::new(signal, "momentum", dec!(100), dec!(0.01))
    }

    fn machine(venues: Vec<Arc<dyn ExecutionVenue>>) -> ExecutionStateMachine {
        let config = ExecutionConfig {
            retry_delay_ms: 1,
            ..ExecutionConfig::default()
        };
        ExecutionStateMachine::new(
            venues,
            RouteSelector::new(SelectorConfig::default()),
            config,
            EventBus::new(64),
            MetricsRecorder::default(),
        )
    }

    #[tokio::test]
    async fn happy_path_completes_with_fill() {
        let venue = ScriptedVenue::quoting("jup", dec!(1000), dec!(1));
        let machine = machine(vec![Arc::new(venue)]);

        let outcome = machine.execute(intent(Urgency::Normal)).await.unwrap();
        assert_eq!(outcome.order().status(), OrderStatus::Completed);
        assert_eq!(outcome.order().attempts(), 1);
        assert!(outcome.fill().is_some());
    }

    #[tokio::test]
    async fn no_routes_fails_without_attempts() {
        let machine = machine(vec![Arc::new(ScriptedVenue::routeless("jup"))]);

        let outcome = machine.execute(intent(Urgency::Normal)).await.unwrap();
        assert_eq!(outcome.order().status(), OrderStatus::Failed);
        assert_eq!(outcome.order().attempts(), 0);
        assert_eq!(outcome.order().errors().len(), 1);
        assert!(outcome.fill().is_none());
    }

    #[tokio::test]
    async fn recoverable_failures_escalate_slippage_then_give_up() {
        let venue = ScriptedVenue::quoting("jup", dec!(1000), dec!(1)).failing_swaps();
        let machine = machine(vec![Arc::new(venue)]);

        let outcome = machine.execute(intent(Urgency::Normal)).await.unwrap();
        let order = outcome.order();
        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(order.attempts(), 3);
        assert_eq!(order.errors().len(), 3);
        // 0.01 * 1.5 * 1.5, escalated once per scheduled retry.
        assert_eq!(order.slippage_tolerance(), dec!(0.0225));
    }

    #[tokio::test]
    async fn high_urgency_gets_an_extra_attempt() {
        let venue = ScriptedVenue::quoting("jup", dec!(1000), dec!(1)).failing_swaps();
        let machine = machine(vec![Arc::new(venue)]);

        let outcome = machine.execute(intent(Urgency::High)).await.unwrap();
        assert_eq!(outcome.order().attempts(), 4);
    }

    #[tokio::test]
    async fn swap_recovers_on_later_attempt() {
        let venue = ScriptedVenue::quoting("jup", dec!(1000), dec!(1)).failing_first_swaps(2);
        let machine = machine(vec![Arc::new(venue)]);

        let outcome = machine.execute(intent(Urgency::Normal)).await.unwrap();
        assert_eq!(outcome.order().status(), OrderStatus::Completed);
        assert_eq!(outcome.order().attempts(), 3);
        assert_eq!(outcome.order().errors().len(), 2);
    }

    #[tokio::test]
    async fn unviable_quotes_mean_no_route() {
        // Quote exists but breaches the impact ceiling.
        let venue = ScriptedVenue::quoting("jup", dec!(1000), dec!(50));
        let machine = machine(vec![Arc::new(venue)]);

        let outcome = machine.execute(intent(Urgency::Normal)).await.unwrap();
        assert_eq!(outcome.order().status(), OrderStatus::Failed);
    }

    #[tokio::test]
    async fn best_quote_across_venues_wins() {
        let worse = ScriptedVenue::quoting("orca", dec!(900), dec!(1));
        let better = ScriptedVenue::quoting("jup", dec!(1000), dec!(1));
        let machine = machine(vec![Arc::new(worse), Arc::new(better)]);

        let outcome = machine.execute(intent(Urgency::Normal)).await.unwrap();
        let fill = outcome.fill().unwrap();
        assert_eq!(fill.venue().as_str(), "jup");
    }

    #[tokio::test]
    async fn state_changes_are_published() {
        let venue = ScriptedVenue::quoting("jup", dec!(1000), dec!(1));
        let machine = machine(vec![Arc::new(venue)]);
        let mut events = machine.bus.subscribe();

        machine.execute(intent(Urgency::Normal)).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let LifecycleEvent::OrderStateChanged { to, .. } = event {
                seen.push(to);
            }
        }
        assert_eq!(
            seen,
            vec!["routing", "executing", "confirming", "completed"]
        );
    }
}
