//! Pipeline metrics: counters and sliding latency windows.
//!
//! Strictly a read-only observer — recording a metric never influences
//! pipeline behavior.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::infrastructure::{ConnectionPool, DataCache, EventRouter, RateLimiter};

/// Maximum latency samples retained per window.
const MAX_SAMPLES: usize = 1000;

/// Percentiles over one sliding latency window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyMetrics {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub sample_count: usize,
}

/// Sliding window of latency samples.
struct LatencyWindow {
    samples: RwLock<VecDeque<Duration>>,
}

impl LatencyWindow {
    fn new() -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(MAX_SAMPLES)),
        }
    }

    fn record(&self, latency: Duration) {
        let mut samples = self.samples.write();
        samples.push_back(latency);
        while samples.len() > MAX_SAMPLES {
            samples.pop_front();
        }
    }

    fn metrics(&self) -> LatencyMetrics {
        let samples = self.samples.read();
        if samples.is_empty() {
            return LatencyMetrics::default();
        }
        let mut sorted: Vec<Duration> = samples.iter().copied().collect();
        sorted.sort();
        LatencyMetrics {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            sample_count: samples.len(),
        }
    }
}

/// Percentile from a sorted slice, `Duration::ZERO` when empty.
fn percentile(samples: &[Duration], p: f64) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let index = ((samples.len() as f64 - 1.0) * p).round() as usize;
    samples[index.min(samples.len() - 1)]
}

#[derive(Default)]
struct Counters {
    events_in: AtomicU64,
    signals_rejected: AtomicU64,
    orders_completed: AtomicU64,
    orders_failed: AtomicU64,
    orders_timed_out: AtomicU64,
    retries: AtomicU64,
    positions_opened: AtomicU64,
    positions_closed: AtomicU64,
}

/// Point-in-time snapshot of all pipeline metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub events_in: u64,
    pub events_dropped: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub limiter_delays: u64,
    pub reconnects: u64,
    pub signals_rejected: u64,
    pub orders_completed: u64,
    pub orders_failed: u64,
    pub orders_timed_out: u64,
    pub retries: u64,
    pub positions_opened: u64,
    pub positions_closed: u64,
    pub execution_latency: LatencyMetrics,
    pub event_latency: LatencyMetrics,
}

/// Counter sources owned by the infrastructure components.
///
/// The cache, limiter, pool and router keep their own counters; the
/// recorder reads them at snapshot time instead of double-counting.
struct StatSources {
    cache: DataCache,
    limiter: RateLimiter,
    pool: ConnectionPool,
    router: EventRouter,
}

/// Shared metrics recorder. Cheap to clone.
#[derive(Clone)]
pub struct MetricsRecorder {
    counters: Arc<Counters>,
    sources: Arc<RwLock<Option<StatSources>>>,
    execution_latency: Arc<LatencyWindow>,
    event_latency: Arc<LatencyWindow>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            sources: Arc::new(RwLock::new(None)),
            execution_latency: Arc::new(LatencyWindow::new()),
            event_latency: Arc::new(LatencyWindow::new()),
        }
    }

    /// Attach the components whose counters feed the snapshot.
    pub fn observe_components(
        &self,
        cache: DataCache,
        limiter: RateLimiter,
        pool: ConnectionPool,
        router: EventRouter,
    ) {
        *self.sources.write() = Some(StatSources {
            cache,
            limiter,
            pool,
            router,
        });
    }

    pub fn event_in(&self) {
        self.counters.events_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn signal_rejected(&self) {
        self.counters
            .signals_rejected
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn order_completed(&self) {
        self.counters
            .orders_completed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn order_failed(&self) {
        self.counters.orders_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn order_timed_out(&self) {
        self.counters
            .orders_timed_out
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry(&self) {
        self.counters.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn position_opened(&self) {
        self.counters
            .positions_opened
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn position_closed(&self) {
        self.counters
            .positions_closed
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record end-to-end latency of one execution attempt chain.
    pub fn record_execution_latency(&self, latency: Duration) {
        self.execution_latency.record(latency);
    }

    /// Record feed-to-routing latency of one market event.
    pub fn record_event_latency(&self, latency: Duration) {
        self.event_latency.record(latency);
    }

    /// Point-in-time snapshot of every counter and window.
    ///
    /// Component-owned counters (cache, limiter, pool, router) read zero
    /// until [`MetricsRecorder::observe_components`] has run.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        let sources = self.sources.read();
        let (cache_hits, cache_misses) = sources
            .as_ref()
            .map_or((0, 0), |s| {
                let stats = s.cache.stats();
                (stats.hits, stats.misses)
            });
        let limiter_delays = sources.as_ref().map_or(0, |s| s.limiter.stats().delayed);
        let (reconnects, events_dropped) = sources.as_ref().map_or((0, 0), |s| {
            let pool = s.pool.stats();
            (
                pool.reconnects,
                pool.dropped_events + s.router.dropped_events(),
            )
        });
        MetricsSnapshot {
            events_in: c.events_in.load(Ordering::Relaxed),
            events_dropped,
            cache_hits,
            cache_misses,
            limiter_delays,
            reconnects,
            signals_rejected: c.signals_rejected.load(Ordering::Relaxed),
            orders_completed: c.orders_completed.load(Ordering::Relaxed),
            orders_failed: c.orders_failed.load(Ordering::Relaxed),
            orders_timed_out: c.orders_timed_out.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            positions_opened: c.positions_opened.load(Ordering::Relaxed),
            positions_closed: c.positions_closed.load(Ordering::Relaxed),
            execution_latency: self.execution_latency.metrics(),
            event_latency: self.event_latency.metrics(),
        }
    }
}
