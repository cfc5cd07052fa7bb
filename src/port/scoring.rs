//! Signal source seam.

use async_trait::async_trait;

use crate::domain::Signal;

/// Produces trade signals for the pipeline.
///
/// How scores are computed is entirely the provider's business; the
/// pipeline only consumes the resulting [`Signal`]s. `next_signal`
/// returning `None` means the provider is exhausted and the pipeline
/// drains out.
#[async_trait]
pub trait ScoringProvider: Send {
    async fn next_signal(&mut self) -> Option<Signal>;
}
