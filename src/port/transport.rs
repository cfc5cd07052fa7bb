//! Transport seam between the connection pool and real stream protocols.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Inbound frames surfaced by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A text frame from the remote endpoint.
    Text(String),
    /// Heartbeat response.
    Pong,
    /// The remote side closed the link.
    Closed { reason: String },
}

/// A single physical stream to one remote endpoint.
///
/// The connection pool owns the reconnect/backoff policy; implementations
/// only need to do honest I/O and report closure. `next_event` returning
/// `None` means the link is gone and a fresh transport must be created.
#[async_trait]
pub trait StreamTransport: Send {
    /// Establish the link.
    async fn connect(&mut self) -> Result<()>;

    /// Send a text frame (e.g. a room-join control message).
    async fn send(&mut self, text: &str) -> Result<()>;

    /// Send a heartbeat ping.
    async fn ping(&mut self) -> Result<()>;

    /// Next inbound frame, or `None` once the link is gone.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// Factory for creating new transport instances.
///
/// Used by the connection pool to create a fresh transport for each
/// (re)connection attempt to a URL.
pub type TransportFactory = Arc<dyn Fn(&str) -> Box<dyn StreamTransport> + Send + Sync>;
