//! A scriptable [`ExecutionVenue`] for exercising the execution machine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{InstrumentId, RouteCandidate, VenueId};
use crate::error::ExecutionError;
use crate::port::{ExecutionVenue, Fill, SwapReceipt};

/// A venue whose quotes, swap results and confirmation behavior are
/// scripted up front.
///
/// Quotes are served with 3 liquidity sources; fills settle at
/// `notional / expected_out` so pnl math stays exact in tests.
pub struct ScriptedVenue {
    id: VenueId,
    quote: Option<(Decimal, Decimal)>,
    fill_price: Decimal,
    fee: Decimal,
    failing_swaps: u32,
    swap_delay: Option<Duration>,
    confirm_delay: Option<Duration>,
    last_route: Mutex<Option<RouteCandidate>>,
    route_calls: AtomicU32,
    swap_calls: AtomicU32,
    confirm_calls: AtomicU32,
}

impl ScriptedVenue {
    /// A venue quoting `expected_out` at `impact_pct` for any instrument.
    pub fn quoting(name: &str, expected_out: Decimal, impact_pct: Decimal) -> Self {
        Self {
            id: VenueId::new(name),
            quote: Some((expected_out, impact_pct)),
            fill_price: Decimal::ONE,
            fee: Decimal::ZERO,
            failing_swaps: 0,
            swap_delay: None,
            confirm_delay: None,
            last_route: Mutex::new(None),
            route_calls: AtomicU32::new(0),
            swap_calls: AtomicU32::new(0),
            confirm_calls: AtomicU32::new(0),
        }
    }

    /// A venue that cannot route anything.
    pub fn routeless(name: &str) -> Self {
        let mut venue = Self::quoting(name, Decimal::ZERO, Decimal::ZERO);
        venue.quote = None;
        venue
    }

    /// Every swap submission fails.
    pub fn failing_swaps(mut self) -> Self {
        self.failing_swaps = u32::MAX;
        self
    }

    /// The first `n` swap submissions fail, later ones succeed.
    pub fn failing_first_swaps(mut self, n: u32) -> Self {
        self.failing_swaps = n;
        self
    }

    /// Settle fills at `price` with `fee`.
    pub fn with_fill(mut self, price: Decimal, fee: Decimal) -> Self {
        self.fill_price = price;
        self.fee = fee;
        self
    }

    /// Stall swap submissions by `delay`.
    pub fn with_swap_delay(mut self, delay: Duration) -> Self {
        self.swap_delay = Some(delay);
        self
    }

    /// Stall confirmations by `delay`.
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = Some(delay);
        self
    }

    pub fn route_calls(&self) -> u32 {
        self.route_calls.load(Ordering::SeqCst)
    }

    pub fn swap_calls(&self) -> u32 {
        self.swap_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> u32 {
        self.confirm_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionVenue for ScriptedVenue {
    fn id(&self) -> &VenueId {
        &self.id
    }

    async fn get_route(
        &self,
        instrument: &InstrumentId,
        _notional: Decimal,
    ) -> Result<RouteCandidate, ExecutionError> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);
        match self.quote {
            Some((expected_out, impact_pct)) => Ok(RouteCandidate::new(
                self.id.clone(),
                instrument.clone(),
                expected_out,
                impact_pct,
                3,
            )),
            None => Err(ExecutionError::RouteNotFound {
                instrument: instrument.to_string(),
            }),
        }
    }

    async fn execute_swap(
        &self,
        route: &RouteCandidate,
        _slippage_tolerance: Decimal,
    ) -> Result<SwapReceipt, ExecutionError> {
        let call = self.swap_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.swap_delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.failing_swaps {
            return Err(ExecutionError::SwapFailed {
                venue: self.id.to_string(),
                reason: "insufficient output".to_string(),
            });
        }
        *self
            .last_route
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(route.clone());
        Ok(SwapReceipt::new(format!("sig-{call}"), self.id.clone()))
    }

    async fn confirm(&self, receipt: &SwapReceipt) -> Result<Fill, ExecutionError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.confirm_delay {
            tokio::time::sleep(delay).await;
        }
        let route = self
            .last_route
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let route = route.ok_or_else(|| ExecutionError::SwapFailed {
            venue: self.id.to_string(),
            reason: "confirm without swap".to_string(),
        })?;
        Ok(Fill::new(
            receipt.signature(),
            self.id.clone(),
            route.instrument().clone(),
            self.fill_price,
            route.expected_out(),
            self.fee,
        ))
    }
}
