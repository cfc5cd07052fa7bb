//! End-to-end pipeline: feeds in, signals through the gate and the
//! execution machine, fills into the ledger, exits on price ticks.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    EventKind, LifecycleEvent, MarketEvent, OrderIntent, Signal, SubscriberId, Urgency,
};
use crate::infrastructure::{EndpointClass, Priority, StreamEvent};
use crate::port::ScoringProvider;

use super::context::Services;
use super::risk_gate::GateResult;

pub struct Pipeline {
    services: Arc<Services>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Spawn the background feed and exit-watch tasks.
    ///
    /// One task per configured feed URL pushes raw frames into the event
    /// router; one task watches price ticks and drives position exits.
    pub fn start(&mut self) {
        for (i, url) in self.services.config().sources.ws_urls.iter().enumerate() {
            let services = Arc::clone(&self.services);
            let url = url.clone();
            let subscriber = SubscriberId::new(format!("pipeline-feed-{i}"));
            self.tasks.push(tokio::spawn(async move {
                drive_feed(services, url, subscriber).await;
            }));
        }

        let services = Arc::clone(&self.services);
        self.tasks.push(tokio::spawn(async move {
            watch_exits(services).await;
        }));
    }

    /// Consume signals until the provider is exhausted.
    pub async fn run<P: ScoringProvider>(&self, mut provider: P) {
        while let Some(signal) = provider.next_signal().await {
            self.handle_signal(signal).await;
        }
        info!("Signal provider exhausted, pipeline draining");
    }

    /// Drive one signal through gate, execution and the ledger.
    pub async fn handle_signal(&self, signal: Signal) {
        let services = &self.services;
        let pipeline = &services.config().pipeline;

        if signal.confidence() < pipeline.min_confidence {
            debug!(
                instrument = %signal.instrument(),
                confidence = %signal.confidence(),
                floor = %pipeline.min_confidence,
                "Signal below confidence floor"
            );
            services.metrics().signal_rejected();
            return;
        }

        let intent = OrderIntent::new(
            signal,
            pipeline.strategy.clone(),
            pipeline.notional,
            pipeline.initial_slippage,
        );

        match services.ledger().check_intent(&intent, Utc::now()) {
            GateResult::Rejected { reasons } => {
                for reason in &reasons {
                    warn!(instrument = %intent.instrument(), "Intent rejected: {reason}");
                }
                services.metrics().signal_rejected();
            }
            GateResult::Approved => {
                let priority = match intent.urgency() {
                    Urgency::High => Priority::High,
                    _ => Priority::Normal,
                };
                services
                    .limiter()
                    .acquire(EndpointClass::Trading, priority)
                    .await;

                match services.execution().execute(intent).await {
                    Ok(outcome) => {
                        let (order, fill) = outcome.into_parts();
                        if let Some(fill) = fill {
                            services.ledger().on_fill(&order, &fill, Utc::now());
                            self.persist();
                        }
                    }
                    Err(err) => error!("Execution aborted: {err}"),
                }
            }
        }
    }

    /// Stop background tasks and persist the ledger.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.persist();
        info!("Pipeline stopped");
    }

    fn persist(&self) {
        if let Err(err) = self.services.ledger().persist(self.services.snapshots()) {
            error!("Ledger snapshot failed: {err}");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Forward frames from one shared stream into the event router.
async fn drive_feed(services: Arc<Services>, url: String, subscriber: SubscriberId) {
    let mut handle = services.pool().acquire(&url, subscriber);
    while let Some(event) = handle.recv().await {
        match event {
            StreamEvent::Text(raw) => {
                services.metrics().event_in();
                services.router().ingest(&raw);
            }
            StreamEvent::State(state) => {
                services.bus().publish(LifecycleEvent::ConnectionStateChanged {
                    url: url.clone(),
                    state,
                    at: Utc::now(),
                });
            }
            StreamEvent::Failed(err) => {
                error!(url = %url, "Feed abandoned: {err}");
                break;
            }
        }
    }
    debug!(url = %url, "Feed task finished");
}

/// Watch price ticks and fire position exits.
async fn watch_exits(services: Arc<Services>) {
    let mut ticks = services.router().subscribe(EventKind::PriceTick);
    while let Some(event) = ticks.recv().await {
        let MarketEvent::PriceTick {
            instrument,
            price,
            observed_at,
        } = event
        else {
            continue;
        };
        if let Ok(latency) = (Utc::now() - observed_at).to_std() {
            services.metrics().record_event_latency(latency);
        }
        let closed = services.ledger().on_tick(&instrument, price, Utc::now());
        if !closed.is_empty() {
            if let Err(err) = services.ledger().persist(services.snapshots()) {
                error!("Ledger snapshot failed: {err}");
            }
        }
    }
}
