//! Sliding-window rate limiter with two-level priority queueing.
//!
//! Outbound requests are grouped into endpoint classes, each with its own
//! budget over one rolling window. A request that fits the window is
//! dispatched immediately; one that does not is queued and woken by a
//! background drain task once capacity frees up. Work is never dropped,
//! only delayed, so callers see latency rather than errors.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::LimiterConfig;

/// Endpoint classes with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    MarketData,
    Trading,
    Facts,
}

impl EndpointClass {
    fn index(self) -> usize {
        match self {
            Self::MarketData => 0,
            Self::Trading => 1,
            Self::Facts => 2,
        }
    }
}

/// Queue priority. High waiters are served before Normal on every drain
/// tick; Normal cannot starve because capacity is time-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

/// Point-in-time limiter statistics.
#[derive(Debug, Clone, Copy)]
pub struct LimiterStats {
    /// Requests dispatched, queued or not.
    pub dispatched: u64,
    /// Requests that had to wait for capacity.
    pub delayed: u64,
}

struct Waiter {
    class: EndpointClass,
    ready: oneshot::Sender<()>,
}

#[derive(Default)]
struct WaitQueues {
    high: VecDeque<Waiter>,
    normal: VecDeque<Waiter>,
}

struct ClassWindow {
    limit: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl ClassWindow {
    /// Take one dispatch slot if the rolling window has room.
    fn try_take(&self, window: Duration) -> bool {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        while timestamps
            .front()
            .is_some_and(|&at| now.duration_since(at) >= window)
        {
            timestamps.pop_front();
        }
        if timestamps.len() < self.limit {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}

struct LimiterInner {
    window: Duration,
    classes: [ClassWindow; 3],
    queues: Mutex<WaitQueues>,
    dispatched: AtomicU64,
    delayed: AtomicU64,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl LimiterInner {
    /// Whether a queued waiter of `class` would be overtaken by a fresh
    /// caller at `priority` taking the fast path.
    fn waiting_ahead(&self, class: EndpointClass, priority: Priority) -> bool {
        let queues = self.queues.lock();
        let pending = |queue: &VecDeque<Waiter>| {
            queue
                .iter()
                .any(|w| w.class == class && !w.ready.is_closed())
        };
        match priority {
            Priority::High => pending(&queues.high),
            Priority::Normal => pending(&queues.high) || pending(&queues.normal),
        }
    }

    fn drain_tick(&self) {
        let mut queues = self.queues.lock();
        Self::drain_queue(&mut queues.high, &self.classes, self.window);
        Self::drain_queue(&mut queues.normal, &self.classes, self.window);
    }

    /// Wake every waiter whose class has capacity, preserving arrival
    /// order within the queue. A waiter blocked on a full class does not
    /// hold up waiters of other classes behind it.
    fn drain_queue(queue: &mut VecDeque<Waiter>, classes: &[ClassWindow; 3], window: Duration) {
        let mut blocked = VecDeque::new();
        while let Some(waiter) = queue.pop_front() {
            if waiter.ready.is_closed() {
                continue;
            }
            if classes[waiter.class.index()].try_take(window) {
                let _ = waiter.ready.send(());
            } else {
                blocked.push_back(waiter);
            }
        }
        *queue = blocked;
    }
}

impl Drop for LimiterInner {
    fn drop(&mut self) {
        if let Some(handle) = self.drain.lock().take() {
            handle.abort();
        }
    }
}

/// Sliding-window rate limiter shared across the pipeline.
///
/// Cheap to clone. Must be created inside a tokio runtime since it spawns
/// its drain task on construction.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &LimiterConfig) -> Self {
        let limits = [
            config.market_data_limit,
            config.trading_limit,
            config.facts_limit,
        ];
        let classes = limits.map(|limit| ClassWindow {
            limit,
            timestamps: Mutex::new(VecDeque::new()),
        });
        let inner = Arc::new(LimiterInner {
            window: Duration::from_millis(config.window_ms),
            classes,
            queues: Mutex::new(WaitQueues::default()),
            dispatched: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
            drain: Mutex::new(None),
        });

        let drain_inner = Arc::downgrade(&inner);
        let cadence = Duration::from_millis(config.drain_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = drain_inner.upgrade() else {
                    return;
                };
                inner.drain_tick();
            }
        });
        *inner.drain.lock() = Some(handle);

        Self { inner }
    }

    /// Wait until a dispatch slot is available for `class`.
    ///
    /// Returns immediately when the window has room and no queued waiter
    /// would be overtaken; otherwise the caller is queued at the given
    /// priority and woken by the drain task.
    pub async fn acquire(&self, class: EndpointClass, priority: Priority) {
        if !self.inner.waiting_ahead(class, priority)
            && self.inner.classes[class.index()].try_take(self.inner.window)
        {
            self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.inner.delayed.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut queues = self.inner.queues.lock();
            let waiter = Waiter { class, ready: tx };
            match priority {
                Priority::High => queues.high.push_back(waiter),
                Priority::Normal => queues.normal.push_back(waiter),
            }
        }
        debug!(class = ?class, priority = ?priority, "Rate limit reached, queued");

        // The drain task only disappears when the limiter itself does; in
        // that case there is nothing left to throttle.
        let _ = rx.await;
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Run `fut` once a dispatch slot for `class` is available.
    pub async fn schedule<F, T>(&self, class: EndpointClass, priority: Priority, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.acquire(class, priority).await;
        fut.await
    }

    /// Point-in-time statistics.
    #[must_use]
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            delayed: self.inner.delayed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(limit: usize, window_ms: u64) -> LimiterConfig {
        LimiterConfig {
            window_ms,
            drain_interval_ms: 5,
            market_data_limit: limit,
            trading_limit: limit,
            facts_limit: limit,
        }
    }

    #[tokio::test]
    async fn dispatches_within_budget_immediately() {
        let limiter = RateLimiter::new(&config(3, 1_000));
        for _ in 0..3 {
            limiter
                .acquire(EndpointClass::Trading, Priority::Normal)
                .await;
        }
        let stats = limiter.stats();
        assert_eq!(stats.dispatched, 3);
        assert_eq!(stats.delayed, 0);
    }

    #[tokio::test]
    async fn over_budget_request_waits_for_the_window() {
        let limiter = RateLimiter::new(&config(2, 50));
        limiter.acquire(EndpointClass::Facts, Priority::Normal).await;
        limiter.acquire(EndpointClass::Facts, Priority::Normal).await;

        let start = std::time::Instant::now();
        limiter.acquire(EndpointClass::Facts, Priority::Normal).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(limiter.stats().delayed, 1);
    }

    #[tokio::test]
    async fn classes_have_independent_budgets() {
        let limiter = RateLimiter::new(&config(1, 60_000));
        limiter
            .acquire(EndpointClass::MarketData, Priority::Normal)
            .await;
        // Would hang if MarketData consumed the Trading budget.
        limiter
            .acquire(EndpointClass::Trading, Priority::Normal)
            .await;
        assert_eq!(limiter.stats().dispatched, 2);
    }

    #[tokio::test]
    async fn high_priority_is_served_before_normal() {
        let limiter = RateLimiter::new(&config(1, 80));
        limiter.acquire(EndpointClass::Trading, Priority::Normal).await;

        let normal = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .acquire(EndpointClass::Trading, Priority::Normal)
                    .await;
                tokio::time::Instant::now()
            })
        };
        // Give the normal waiter time to enqueue first.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let high = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.acquire(EndpointClass::Trading, Priority::High).await;
                tokio::time::Instant::now()
            })
        };

        let high_at = high.await.unwrap();
        let normal_at = normal.await.unwrap();
        assert!(high_at <= normal_at);
    }

    #[tokio::test]
    async fn fresh_caller_does_not_overtake_queued_high_waiter() {
        let limiter = RateLimiter::new(&LimiterConfig {
            window_ms: 30,
            drain_interval_ms: 200,
            market_data_limit: 1,
            trading_limit: 1,
            facts_limit: 1,
        });
        limiter.acquire(EndpointClass::Trading, Priority::High).await;

        let high = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.acquire(EndpointClass::Trading, Priority::High).await;
            })
        };
        // Let the waiter enqueue, then let the window slot expire.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Capacity freed between drain ticks belongs to the queued
        // waiter; a fresh caller has to line up behind it.
        let fresh = tokio::time::timeout(
            Duration::from_millis(50),
            limiter.acquire(EndpointClass::Trading, Priority::Normal),
        )
        .await;
        assert!(fresh.is_err());

        high.await.unwrap();
    }

    #[tokio::test]
    async fn schedule_runs_the_future_after_acquiring() {
        let limiter = RateLimiter::new(&config(5, 1_000));
        let out = limiter
            .schedule(EndpointClass::Facts, Priority::Normal, async { 7 })
            .await;
        assert_eq!(out, 7);
        assert_eq!(limiter.stats().dispatched, 1);
    }
}
