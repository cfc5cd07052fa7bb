//! Core domain types: identifiers, signals, events, orders, routes,
//! positions, and risk state.
//!
//! Everything here is venue- and provider-agnostic; adapters translate to
//! and from these types at the edges.

pub mod event;
pub mod id;
pub mod order;
pub mod position;
pub mod risk;
pub mod route;
pub mod signal;

pub use event::{ConnState, EventKind, LifecycleEvent, MarketEvent, TradeSide};
pub use id::{InstrumentId, OrderId, PositionId, SubscriberId, VenueId};
pub use order::{Order, OrderIntent, OrderStatus};
pub use position::{CloseReason, Position, PositionBook, PositionStatus};
pub use risk::RiskState;
pub use route::RouteCandidate;
pub use signal::{Signal, Urgency};
