//! Scored trading signals produced by an external scoring collaborator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::id::InstrumentId;

/// How quickly a signal should be acted on.
///
/// Urgency widens the execution attempt budget and bumps rate-limiter
/// priority; it never changes which risk checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    High,
}

/// A scored opportunity emitted by a [`ScoringProvider`](crate::port::scoring::ScoringProvider).
///
/// Immutable once created; the pipeline consumes it exactly once via the
/// risk gate. How the confidence value was computed is outside this crate.
#[derive(Debug, Clone)]
pub struct Signal {
    source: String,
    instrument: InstrumentId,
    confidence: Decimal,
    urgency: Urgency,
    created_at: DateTime<Utc>,
}

impl Signal {
    /// Create a new signal.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        instrument: InstrumentId,
        confidence: Decimal,
        urgency: Urgency,
    ) -> Self {
        Self {
            source: source.into(),
            instrument,
            confidence,
            urgency,
            created_at: Utc::now(),
        }
    }

    /// Provider or strategy that produced the signal.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Instrument the signal refers to.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Confidence score in `0..=1`.
    #[must_use]
    pub fn confidence(&self) -> Decimal {
        self.confidence
    }

    /// Urgency classification.
    #[must_use]
    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    /// When the signal was produced.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
