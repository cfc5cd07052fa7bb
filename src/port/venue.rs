//! Execution venue seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{InstrumentId, RouteCandidate, VenueId};
use crate::error::ExecutionError;

/// Receipt returned by a venue once a swap has been submitted.
#[derive(Debug, Clone)]
pub struct SwapReceipt {
    signature: String,
    venue: VenueId,
    submitted_at: DateTime<Utc>,
}

impl SwapReceipt {
    #[must_use]
    pub fn new(signature: impl Into<String>, venue: VenueId) -> Self {
        Self {
            signature: signature.into(),
            venue,
            submitted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[must_use]
    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// A confirmed fill: the terminal, settled outcome of a swap.
#[derive(Debug, Clone)]
pub struct Fill {
    signature: String,
    venue: VenueId,
    instrument: InstrumentId,
    price: Decimal,
    quantity: Decimal,
    fee: Decimal,
    confirmed_at: DateTime<Utc>,
}

impl Fill {
    #[must_use]
    pub fn new(
        signature: impl Into<String>,
        venue: VenueId,
        instrument: InstrumentId,
        price: Decimal,
        quantity: Decimal,
        fee: Decimal,
    ) -> Self {
        Self {
            signature: signature.into(),
            venue,
            instrument,
            price,
            quantity,
            fee,
            confirmed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[must_use]
    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    #[must_use]
    pub fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    #[must_use]
    pub fn fee(&self) -> Decimal {
        self.fee
    }

    #[must_use]
    pub fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }
}

/// A swap venue the route selector can choose and the state machine can
/// drive.
///
/// `get_route` is a quote; `execute_swap` submits the swap for the quoted
/// route at the order's current slippage tolerance; `confirm` waits for
/// on-venue settlement of a submitted swap.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Stable identifier for this venue.
    fn id(&self) -> &VenueId;

    /// Quote a route for `notional` on `instrument`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::RouteNotFound`] when the venue cannot
    /// route the instrument at all.
    async fn get_route(
        &self,
        instrument: &InstrumentId,
        notional: Decimal,
    ) -> Result<RouteCandidate, ExecutionError>;

    /// Submit the swap.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::SwapFailed`] when the venue rejects the
    /// submission.
    async fn execute_swap(
        &self,
        route: &RouteCandidate,
        slippage_tolerance: Decimal,
    ) -> Result<SwapReceipt, ExecutionError>;

    /// Wait for settlement of a submitted swap.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::SwapFailed`] when the swap reverts on
    /// venue.
    async fn confirm(&self, receipt: &SwapReceipt) -> Result<Fill, ExecutionError>;
}
