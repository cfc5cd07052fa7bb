//! Shared stream connection pool.
//!
//! One physical connection is held per URL; every subscriber to that URL
//! shares it through a [`StreamHandle`]. The pool reference-counts
//! subscribers and tears the connection down once the last handle is
//! released. Each connection is driven by a worker task that owns the
//! transport, forwards inbound frames to subscribers, heartbeats the link,
//! and reconnects with exponential backoff when it drops.

mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{PoolConfig, ReconnectionConfig};
use crate::domain::{ConnState, SubscriberId};
use crate::error::{ConnectionError, Result};
use crate::port::TransportFactory;

/// Events fanned out to every subscriber of a pooled connection.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Raw text frame from the remote endpoint.
    Text(String),
    /// Connection lifecycle change.
    State(ConnState),
    /// The worker exhausted its reconnect budget and gave up.
    Failed(ConnectionError),
}

/// Counters shared between the pool and its workers.
#[derive(Debug, Default)]
pub struct PoolCounters {
    pub reconnects: AtomicU64,
    pub dropped_events: AtomicU64,
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub active_connections: usize,
    pub total_subscribers: usize,
    pub reconnects: u64,
    pub dropped_events: u64,
}

struct PoolEntry {
    subscribers: HashSet<SubscriberId>,
    events: broadcast::Sender<StreamEvent>,
    outbound: mpsc::Sender<String>,
    worker: JoinHandle<()>,
}

struct PoolInner {
    entries: Mutex<HashMap<String, PoolEntry>>,
    factory: TransportFactory,
    pool_config: PoolConfig,
    reconnection: ReconnectionConfig,
    counters: Arc<PoolCounters>,
}

impl PoolInner {
    fn release(&self, url: &str, subscriber: &SubscriberId) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(url) else {
            return;
        };
        entry.subscribers.remove(subscriber);
        let remaining = entry.subscribers.len();
        debug!(url = %url, subscriber = %subscriber, remaining, "Stream released");
        if remaining == 0 {
            if let Some(entry) = entries.remove(url) {
                entry.worker.abort();
            }
            info!(url = %url, "Last subscriber gone, connection closed");
        }
    }
}

/// Reference-counted pool of physical stream connections.
///
/// Cheap to clone; all clones share the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(
        factory: TransportFactory,
        pool_config: PoolConfig,
        reconnection: ReconnectionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                entries: Mutex::new(HashMap::new()),
                factory,
                pool_config,
                reconnection,
                counters: Arc::new(PoolCounters::default()),
            }),
        }
    }

    /// Acquire a handle on the connection to `url`, creating the physical
    /// connection if this is the first subscriber.
    ///
    /// A worker that died after exhausting its reconnect budget is
    /// respawned here, so a later subscriber gets a live connection
    /// attempt instead of joining a dead entry.
    pub fn acquire(&self, url: &str, subscriber: SubscriberId) -> StreamHandle {
        let mut entries = self.inner.entries.lock();
        let dead = entries.get(url).map_or(false, |e| e.worker.is_finished());
        if dead {
            if let Some(old) = entries.remove(url) {
                info!(url = %url, "Stream worker had stopped, reopening connection");
                let mut fresh = self.spawn_entry(url);
                fresh.subscribers = old.subscribers;
                entries.insert(url.to_string(), fresh);
            }
        }
        let entry = entries.entry(url.to_string()).or_insert_with(|| {
            info!(url = %url, "Opening pooled connection");
            self.spawn_entry(url)
        });
        entry.subscribers.insert(subscriber.clone());
        debug!(
            url = %url,
            subscriber = %subscriber,
            refcount = entry.subscribers.len(),
            "Stream acquired"
        );
        StreamHandle {
            url: url.to_string(),
            subscriber,
            receiver: entry.events.subscribe(),
            outbound: entry.outbound.clone(),
            inner: Arc::clone(&self.inner),
        }
    }

    fn spawn_entry(&self, url: &str) -> PoolEntry {
        let (events, _) = broadcast::channel(self.inner.pool_config.channel_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.inner.pool_config.outbound_capacity);
        let worker = tokio::spawn(worker::run(
            url.to_string(),
            Arc::clone(&self.inner.factory),
            self.inner.pool_config.clone(),
            self.inner.reconnection.clone(),
            events.clone(),
            outbound_rx,
            Arc::clone(&self.inner.counters),
        ));
        PoolEntry {
            subscribers: HashSet::new(),
            events,
            outbound: outbound_tx,
            worker,
        }
    }

    /// Number of subscribers currently sharing the connection to `url`.
    #[must_use]
    pub fn subscriber_count(&self, url: &str) -> usize {
        self.inner
            .entries
            .lock()
            .get(url)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Point-in-time statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let entries = self.inner.entries.lock();
        PoolStats {
            active_connections: entries.len(),
            total_subscribers: entries.values().map(|e| e.subscribers.len()).sum(),
            reconnects: self.inner.counters.reconnects.load(Ordering::Relaxed),
            dropped_events: self.inner.counters.dropped_events.load(Ordering::Relaxed),
        }
    }
}

/// A subscriber's view of a pooled connection.
///
/// Dropping the handle releases the subscription; the physical connection
/// closes once the last handle to its URL is gone.
pub struct StreamHandle {
    url: String,
    subscriber: SubscriberId,
    receiver: broadcast::Receiver<StreamEvent>,
    outbound: mpsc::Sender<String>,
    inner: Arc<PoolInner>,
}

impl StreamHandle {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next event from the shared connection, or `None` once the
    /// connection is gone. A slow subscriber that falls behind the bounded
    /// buffer loses the oldest events; the loss is counted on the pool.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.inner
                        .counters
                        .dropped_events
                        .fetch_add(missed, Ordering::Relaxed);
                    debug!(url = %self.url, missed, "Subscriber lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Queue an outbound text frame (e.g. a room-join control message).
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] when the connection worker
    /// is gone.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.outbound.send(text.into()).await.map_err(|_| {
            ConnectionError::NotConnected {
                url: self.url.clone(),
            }
            .into()
        })
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.inner.release(&self.url, &self.subscriber);
    }
}
