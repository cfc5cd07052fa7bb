//! Venue route quotes considered by the route selector.

use rust_decimal::Decimal;

use super::id::{InstrumentId, VenueId};

/// A candidate route returned by a venue quote.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    venue: VenueId,
    instrument: InstrumentId,
    expected_out: Decimal,
    price_impact_pct: Decimal,
    liquidity_sources: u32,
}

impl RouteCandidate {
    /// Create a new route candidate.
    #[must_use]
    pub fn new(
        venue: VenueId,
        instrument: InstrumentId,
        expected_out: Decimal,
        price_impact_pct: Decimal,
        liquidity_sources: u32,
    ) -> Self {
        Self {
            venue,
            instrument,
            expected_out,
            price_impact_pct,
            liquidity_sources,
        }
    }

    /// Venue offering this route.
    #[must_use]
    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    /// Instrument the quote is for.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Estimated output amount.
    #[must_use]
    pub fn expected_out(&self) -> Decimal {
        self.expected_out
    }

    /// Estimated price impact in percent (e.g. 2.5 = 2.5%).
    #[must_use]
    pub fn price_impact_pct(&self) -> Decimal {
        self.price_impact_pct
    }

    /// Number of liquidity sources backing the route.
    #[must_use]
    pub fn liquidity_sources(&self) -> u32 {
        self.liquidity_sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn route_candidate_accessors() {
        let route = RouteCandidate::new(
            VenueId::new("jupiter"),
            InstrumentId::new("mint-1"),
            dec!(995.5),
            dec!(0.8),
            3,
        );
        assert_eq!(route.venue().as_str(), "jupiter");
        assert_eq!(route.expected_out(), dec!(995.5));
        assert_eq!(route.price_impact_pct(), dec!(0.8));
        assert_eq!(route.liquidity_sources(), 3);
    }
}
