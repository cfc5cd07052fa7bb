//! Riptide - Low-latency trading pipeline for on-chain token markets.
//!
//! This crate turns raw market feeds into risk-checked, venue-routed swap
//! executions and tracks the resulting positions until exit.
//!
//! # Architecture
//!
//! Data flows through a fixed chain of components:
//!
//! - **`infrastructure`** - Shared I/O plumbing
//!   - `ConnectionPool` - One physical stream per URL, reconnect with backoff
//!   - `RateLimiter` - Per-endpoint-class sliding windows, priority queueing
//!   - `DataCache` - TTL'd market facts with oldest-first eviction
//!   - `EventRouter` - Raw frame normalization and per-kind fan-out
//!
//! - **`application`** - Trading semantics
//!   - `RiskGate` - Ordered pre-trade checks under the ledger lock
//!   - `RouteSelector` - Weighted scoring of venue quotes
//!   - `ExecutionStateMachine` - Forward-only order lifecycle with retries
//!   - `PositionLedger` - Positions, exits, risk accounting, persistence
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Core types: signals, orders, routes, positions
//! - [`error`] - Error types for the crate
//! - [`port`] - Trait seams: transports, execution venues, signal sources
//! - [`infrastructure`] - Connection pool, limiter, cache, router
//! - [`application`] - Gate, selector, execution, ledger, pipeline wiring
//!
//! # Example
//!
//! ```no_run
//! use riptide::application::{Pipeline, Services};
//! use riptide::config::Config;
//! use riptide::infrastructure::ws_transport_factory;
//! use std::sync::Arc;
//!
//! # fn main() -> riptide::Result<()> {
//! let config = Config::load("riptide.toml")?;
//! config.init_logging();
//! let services = Services::from_config(config, ws_transport_factory(), Vec::new())?;
//! let mut pipeline = Pipeline::new(Arc::new(services));
//! pipeline.start();
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result};
