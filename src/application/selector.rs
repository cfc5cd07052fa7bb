//! Route scoring and selection across venues.

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::SelectorConfig;
use crate::domain::RouteCandidate;

/// Scores quotes from competing venues and picks the best viable one.
///
/// The score is a weighted sum of venue preference, relative output,
/// price impact and liquidity depth. A candidate whose impact exceeds
/// the configured ceiling is never selected regardless of score.
pub struct RouteSelector {
    config: SelectorConfig,
}

impl RouteSelector {
    #[must_use]
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Pick the best viable candidate, or `None` when every quote is
    /// unviable or the slice is empty.
    #[must_use]
    pub fn select(&self, candidates: &[RouteCandidate]) -> Option<RouteCandidate> {
        let viable: Vec<&RouteCandidate> = candidates
            .iter()
            .filter(|c| c.price_impact_pct() <= self.config.max_price_impact_pct)
            .collect();
        if viable.is_empty() {
            debug!(candidates = candidates.len(), "No viable route");
            return None;
        }

        let best_out = viable
            .iter()
            .map(|c| c.expected_out())
            .max()
            .unwrap_or(Decimal::ZERO);

        let mut ranked: Vec<(Decimal, usize, Decimal, &RouteCandidate)> = viable
            .into_iter()
            .map(|c| {
                let rank = self.preference_rank(c);
                (self.score(c, best_out, rank), rank, c.price_impact_pct(), c)
            })
            .collect();
        // Highest score first; ties break on preference order, then impact.
        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        let (score, _, _, chosen) = ranked.first()?;
        debug!(
            venue = %chosen.venue(),
            score = %score,
            expected_out = %chosen.expected_out(),
            impact_pct = %chosen.price_impact_pct(),
            "Route selected"
        );
        Some((*chosen).clone())
    }

    fn score(&self, candidate: &RouteCandidate, best_out: Decimal, rank: usize) -> Decimal {
        let prefs = self.config.venue_preference.len();
        let preference = if rank < prefs {
            self.config.preference_weight * Decimal::from(prefs - rank)
        } else {
            Decimal::ZERO
        };

        let output = if best_out > Decimal::ZERO {
            self.config.output_weight * (candidate.expected_out() / best_out)
        } else {
            Decimal::ZERO
        };

        let impact = self.config.impact_penalty * candidate.price_impact_pct();

        let sources = candidate.liquidity_sources().min(self.config.source_cap);
        let depth = self.config.source_bonus * Decimal::from(sources);

        preference + output - impact + depth
    }

    fn preference_rank(&self, candidate: &RouteCandidate) -> usize {
        self.config
            .venue_preference
            .iter()
            .position(|name| name == candidate.venue().as_str())
            .unwrap_or(self.config.venue_preference.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InstrumentId, VenueId};
    use rust_decimal_macros::dec;

    fn candidate(
        venue: &str,
        out: Decimal,
        impact_pct: Decimal,
        sources: u32,
    ) -> RouteCandidate {
        RouteCandidate::new(
            VenueId::new(venue),
            InstrumentId::new("mint-1"),
            out,
            impact_pct,
            sources,
        )
    }

    fn selector() -> RouteSelector {
        RouteSelector::new(SelectorConfig {
            venue_preference: vec!["alpha".to_string(), "beta".to_string()],
            preference_weight: dec!(0.5),
            output_weight: dec!(10),
            impact_penalty: dec!(0.2),
            source_bonus: dec!(0.1),
            source_cap: 5,
            max_price_impact_pct: dec!(10),
        })
    }

    #[test]
    fn empty_slice_selects_nothing() {
        assert!(selector().select(&[]).is_none());
    }

    #[test]
    fn excessive_impact_is_never_selected() {
        let routes = vec![candidate("alpha", dec!(1000), dec!(11), 5)];
        assert!(selector().select(&routes).is_none());
    }

    #[test]
    fn best_output_wins_among_equals() {
        let routes = vec![
            candidate("beta", dec!(900), dec!(1), 3),
            candidate("gamma", dec!(1000), dec!(1), 3),
        ];
        // gamma has no preference bonus but 10% more output outweighs it.
        let chosen = selector().select(&routes).unwrap();
        assert_eq!(chosen.venue().as_str(), "gamma");
    }

    #[test]
    fn preference_breaks_close_calls() {
        let routes = vec![
            candidate("beta", dec!(1000), dec!(1), 3),
            candidate("alpha", dec!(1000), dec!(1), 3),
        ];
        let chosen = selector().select(&routes).unwrap();
        assert_eq!(chosen.venue().as_str(), "alpha");
    }

    #[test]
    fn exact_ties_prefer_lower_impact() {
        // Zero impact penalty forces a literal score tie; the tie-break
        // must still prefer the shallower impact.
        let selector = RouteSelector::new(SelectorConfig {
            venue_preference: vec![],
            preference_weight: dec!(0.5),
            output_weight: dec!(10),
            impact_penalty: dec!(0),
            source_bonus: dec!(0),
            source_cap: 5,
            max_price_impact_pct: dec!(10),
        });
        let routes = vec![
            candidate("gamma", dec!(1000), dec!(3), 3),
            candidate("delta", dec!(1000), dec!(1), 3),
        ];
        let chosen = selector.select(&routes).unwrap();
        assert_eq!(chosen.venue().as_str(), "delta");
    }

    #[test]
    fn source_bonus_caps() {
        let selector = selector();
        let shallow = candidate("gamma", dec!(1000), dec!(1), 5);
        let deep = candidate("gamma", dec!(1000), dec!(1), 50);
        let best = dec!(1000);
        assert_eq!(
            selector.score(&shallow, best, 2),
            selector.score(&deep, best, 2)
        );
    }
}
