//! Trait seams between the application core and the outside world.

pub mod scoring;
pub mod transport;
pub mod venue;

pub use scoring::ScoringProvider;
pub use transport::{StreamTransport, TransportEvent, TransportFactory};
pub use venue::{ExecutionVenue, Fill, SwapReceipt};
