//! Mock [`StreamTransport`] implementations for testing.
//!
//! Two mock transport types for different testing needs:
//!
//! - [`ScriptedTransport`] — Pre-loaded connect results and frame queue.
//!   Best for: reconnection logic, backoff, heartbeat timeouts.
//!
//! - [`ChannelTransport`] — Channel-backed transport with an external
//!   control handle. Best for: integration tests needing precise,
//!   on-demand frame delivery and outbound capture.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ConnectionError, Result};
use crate::port::{StreamTransport, TransportEvent, TransportFactory};

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// A mock transport with scripted connect results and a fixed frame queue.
///
/// Each call to `connect()` pops the next result from the queue (defaults
/// to `Ok(())` when exhausted). Pings are answered with an immediate Pong;
/// an exhausted frame queue yields `None`, which the pool reads as the
/// link going away.
pub struct ScriptedTransport {
    connect_results: VecDeque<Result<()>>,
    frames: VecDeque<TransportEvent>,
    auto_pong: bool,
    pong_pending: bool,
    connect_count: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            connect_results: VecDeque::new(),
            frames: VecDeque::new(),
            auto_pong: true,
            pong_pending: false,
            connect_count: Arc::new(AtomicU32::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_connect_results(mut self, results: Vec<Result<()>>) -> Self {
        self.connect_results = results.into();
        self
    }

    pub fn with_frames(mut self, frames: Vec<TransportEvent>) -> Self {
        self.frames = frames.into();
        self
    }

    pub fn with_text_frames(self, texts: Vec<&str>) -> Self {
        let frames = texts
            .into_iter()
            .map(|t| TransportEvent::Text(t.to_string()))
            .collect();
        self.with_frames(frames)
    }

    /// Disable the automatic Pong reply to pings, so heartbeat timeouts
    /// can be exercised.
    pub fn without_pongs(mut self) -> Self {
        self.auto_pong = false;
        self
    }

    /// Replace the connect counter with a shared one.
    ///
    /// Useful when a factory creates multiple transports that should share
    /// a single counter (e.g. counting total reconnections).
    pub fn set_connect_count(&mut self, counter: Arc<AtomicU32>) {
        self.connect_count = counter;
    }

    /// Share the outbound capture buffer.
    pub fn set_sent(&mut self, sent: Arc<Mutex<Vec<String>>>) {
        self.sent = sent;
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        if self.auto_pong {
            self.pong_pending = true;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.pong_pending {
            self.pong_pending = false;
            return Some(TransportEvent::Pong);
        }
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            // Park instead of ending the session so scripted tests decide
            // when the link dies by queueing a Closed frame.
            None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                None
            }
        }
    }
}

/// A factory whose transports connect successfully and never produce
/// frames. Handy for wiring tests that never touch the feed.
pub fn silent_transport_factory() -> TransportFactory {
    Arc::new(|_url| Box::new(ScriptedTransport::new()))
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// External control handle for a [`ChannelTransport`].
#[derive(Clone)]
pub struct ChannelHandle {
    frames: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    connect_count: Arc<AtomicU32>,
}

impl ChannelHandle {
    /// Deliver a text frame to the transport.
    pub fn push_text(&self, text: &str) {
        let _ = self
            .frames
            .send(TransportEvent::Text(text.to_string()));
    }

    /// Deliver an arbitrary frame.
    pub fn push(&self, frame: TransportEvent) {
        let _ = self.frames.send(frame);
    }

    /// Close the link from the remote side.
    pub fn close(&self, reason: &str) {
        let _ = self.frames.send(TransportEvent::Closed {
            reason: reason.to_string(),
        });
    }

    /// Everything the transport was asked to send.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }
}

/// A transport whose frames arrive through a channel controlled by a
/// [`ChannelHandle`].
pub struct ChannelTransport {
    frames: mpsc::UnboundedReceiver<TransportEvent>,
    pong_pending: bool,
    sent: Arc<Mutex<Vec<String>>>,
    connect_count: Arc<AtomicU32>,
}

impl ChannelTransport {
    /// Create a transport and its control handle.
    pub fn pair() -> (Self, ChannelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let connect_count = Arc::new(AtomicU32::new(0));
        let handle = ChannelHandle {
            frames: tx,
            sent: Arc::clone(&sent),
            connect_count: Arc::clone(&connect_count),
        };
        let transport = Self {
            frames: rx,
            pong_pending: false,
            sent,
            connect_count,
        };
        (transport, handle)
    }
}

#[async_trait]
impl StreamTransport for ChannelTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.pong_pending = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.pong_pending {
            self.pong_pending = false;
            return Some(TransportEvent::Pong);
        }
        self.frames.recv().await
    }
}

/// A scripted connect failure, as the pool surfaces it.
pub fn connect_refused(url: &str) -> crate::error::Error {
    ConnectionError::ConnectFailed {
        url: url.to_string(),
        reason: "connection refused".to_string(),
    }
    .into()
}
