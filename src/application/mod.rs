//! Application layer: wires infrastructure into the trading pipeline.

pub mod context;
pub mod events;
pub mod execution;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod risk_gate;
pub mod selector;

pub use context::Services;
pub use events::EventBus;
pub use execution::{ExecutionOutcome, ExecutionStateMachine};
pub use ledger::{ClosedPosition, LedgerState, PositionLedger, SnapshotStore};
pub use metrics::{LatencyMetrics, MetricsRecorder, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use risk_gate::{GateResult, RiskGate};
pub use selector::RouteSelector;
