//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`transport`] — Mock [`StreamTransport`](crate::port::StreamTransport)
//!   implementations: `ScriptedTransport`, `ChannelTransport`.
//! - [`venue`] — [`ScriptedVenue`](venue::ScriptedVenue), a scriptable
//!   [`ExecutionVenue`](crate::port::ExecutionVenue).
//! - [`domain`] — Builders for domain primitives: signals, intents, fills.
//! - [`config`] — Canonical test configurations (reconnection, pool, etc.).

pub mod config;
pub mod domain;
pub mod transport;
pub mod venue;

pub use transport::{
    silent_transport_factory, ChannelHandle, ChannelTransport, ScriptedTransport,
};
pub use venue::ScriptedVenue;
