//! Service container: builds and owns every pipeline component.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::infrastructure::{
    ConnectionPool, DataCache, EventRouter, FactsClient, RateLimiter,
};
use crate::port::{ExecutionVenue, TransportFactory};

use super::events::EventBus;
use super::execution::ExecutionStateMachine;
use super::ledger::{PositionLedger, SnapshotStore};
use super::metrics::MetricsRecorder;
use super::selector::RouteSelector;

const LIFECYCLE_CAPACITY: usize = 1_024;

/// All wired services, built once from a [`Config`].
///
/// The transport factory and execution venues are injected so the same
/// wiring serves live trading and scripted harnesses.
pub struct Services {
    config: Config,
    pool: ConnectionPool,
    limiter: RateLimiter,
    cache: DataCache,
    router: EventRouter,
    facts: Option<FactsClient>,
    bus: EventBus,
    metrics: MetricsRecorder,
    ledger: Arc<PositionLedger>,
    execution: ExecutionStateMachine,
    snapshots: SnapshotStore,
}

impl Services {
    /// Build the full service graph.
    ///
    /// Restores ledger state from the configured snapshot path when a
    /// snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing snapshot cannot be read or
    /// parsed.
    pub fn from_config(
        config: Config,
        transport_factory: TransportFactory,
        venues: Vec<Arc<dyn ExecutionVenue>>,
    ) -> Result<Self> {
        let metrics = MetricsRecorder::new();
        let bus = EventBus::new(LIFECYCLE_CAPACITY);

        let pool = ConnectionPool::new(
            transport_factory,
            config.pool.clone(),
            config.reconnection.clone(),
        );
        let limiter = RateLimiter::new(&config.limiter);
        let cache = DataCache::new(&config.cache);
        let router = EventRouter::new(config.pool.channel_capacity);
        metrics.observe_components(
            cache.clone(),
            limiter.clone(),
            pool.clone(),
            router.clone(),
        );
        let facts = if config.sources.facts_api_url.is_empty() {
            None
        } else {
            Some(FactsClient::new(
                config.sources.facts_api_url.clone(),
                limiter.clone(),
                cache.clone(),
            ))
        };

        let snapshots = SnapshotStore::new(config.sources.snapshot_path.clone());
        let ledger = match snapshots.load()? {
            Some(state) => {
                info!(path = %snapshots.path().display(), "Restored ledger snapshot");
                PositionLedger::with_state(
                    state,
                    config.risk.clone(),
                    config.position.clone(),
                    bus.clone(),
                    metrics.clone(),
                )
            }
            None => PositionLedger::new(
                config.risk.clone(),
                config.position.clone(),
                bus.clone(),
                metrics.clone(),
            ),
        };

        let execution = ExecutionStateMachine::new(
            venues,
            RouteSelector::new(config.selector.clone()),
            config.execution.clone(),
            bus.clone(),
            metrics.clone(),
        );

        Ok(Self {
            config,
            pool,
            limiter,
            cache,
            router,
            facts,
            bus,
            metrics,
            ledger: Arc::new(ledger),
            execution,
            snapshots,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    #[must_use]
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Facts client, present only when a facts API URL is configured.
    #[must_use]
    pub fn facts(&self) -> Option<&FactsClient> {
        self.facts.as_ref()
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn execution(&self) -> &ExecutionStateMachine {
        &self.execution
    }

    #[must_use]
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }
}
