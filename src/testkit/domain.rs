//! Builders for domain primitives used across tests.
//!
//! Provides concise factory functions for [`Signal`], [`OrderIntent`],
//! [`Fill`], and related types so tests focus on assertions rather than
//! construction boilerplate.

use rust_decimal::Decimal;

use crate::domain::{InstrumentId, OrderIntent, Signal, Urgency, VenueId};
use crate::port::Fill;

/// Create an [`InstrumentId`] from a string.
pub fn instrument(id: &str) -> InstrumentId {
    InstrumentId::new(id)
}

/// Create a [`Signal`] with the given confidence and normal urgency.
pub fn signal(mint: &str, confidence: Decimal) -> Signal {
    Signal::new("test-source", InstrumentId::new(mint), confidence, Urgency::Normal)
}

/// Create a [`Signal`] with explicit urgency.
pub fn urgent_signal(mint: &str, confidence: Decimal) -> Signal {
    Signal::new("test-source", InstrumentId::new(mint), confidence, Urgency::High)
}

/// Create an [`OrderIntent`] for the `momentum` strategy with 1% slippage.
pub fn intent(mint: &str, notional: Decimal) -> OrderIntent {
    OrderIntent::new(
        signal(mint, Decimal::new(8, 1)),
        "momentum",
        notional,
        Decimal::new(1, 2),
    )
}

/// Create a fee-free [`Fill`] at the given price and quantity.
pub fn fill(mint: &str, price: Decimal, quantity: Decimal) -> Fill {
    Fill::new(
        "sig-test",
        VenueId::new("jup"),
        InstrumentId::new(mint),
        price,
        quantity,
        Decimal::ZERO,
    )
}
