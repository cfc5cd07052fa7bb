//! End-to-end pipeline: frames in, gate, execution, ledger exits.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use riptide::application::{Pipeline, Services};
use riptide::config::Config;
use riptide::port::{ExecutionVenue, ScoringProvider, TransportFactory};
use riptide::testkit::{domain, ChannelHandle, ChannelTransport, ScriptedVenue};
use rust_decimal_macros::dec;

/// Hands out one [`ChannelTransport`] and keeps its control handle.
fn channel_factory() -> (TransportFactory, ChannelHandle) {
    let (transport, handle) = ChannelTransport::pair();
    let slot = Mutex::new(Some(transport));
    let factory: TransportFactory = Arc::new(move |_url| {
        let transport = slot
            .lock()
            .unwrap()
            .take()
            .expect("transport requested twice");
        Box::new(transport)
    });
    (factory, handle)
}

fn test_config(snapshot_dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.sources.ws_urls = vec!["ws://feed.test".to_string()];
    config.sources.snapshot_path = snapshot_dir
        .path()
        .join("ledger.json")
        .to_string_lossy()
        .into_owned();
    config.execution.retry_delay_ms = 1;
    config
}

/// A provider that yields a fixed list of signals, then ends.
struct FixedSignals(Vec<riptide::domain::Signal>);

#[async_trait::async_trait]
impl ScoringProvider for FixedSignals {
    async fn next_signal(&mut self) -> Option<riptide::domain::Signal> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }
}

#[tokio::test]
async fn signal_becomes_position_and_stop_loss_closes_it() {
    let dir = tempfile::tempdir().unwrap();
    let (factory, remote) = channel_factory();
    let venue: Arc<dyn ExecutionVenue> =
        Arc::new(ScriptedVenue::quoting("jup", dec!(100), dec!(1)));

    let services = Arc::new(
        Services::from_config(test_config(&dir), factory, vec![venue]).unwrap(),
    );
    let mut pipeline = Pipeline::new(Arc::clone(&services));
    pipeline.start();

    // One confident signal opens a position at the venue fill price 1.00.
    pipeline
        .run(FixedSignals(vec![domain::signal("mint-1", dec!(0.9))]))
        .await;
    assert_eq!(services.ledger().open_count(), 1);
    assert_eq!(services.metrics().snapshot().orders_completed, 1);

    // A tick above the stop only marks; one below it closes the position.
    remote.push_text(r#"{"room":"price:mint-1","content":{"price":"0.95"}}"#);
    remote.push_text(r#"{"room":"price:mint-1","content":{"price":"0.84"}}"#);
    wait_until(|| services.ledger().open_count() == 0).await;

    assert_eq!(services.ledger().daily_pnl(), dec!(-16.00));
    let metrics = services.metrics().snapshot();
    assert_eq!(metrics.positions_opened, 1);
    assert_eq!(metrics.positions_closed, 1);

    pipeline.shutdown();
    // The snapshot written on close survives for the next run.
    let restored = riptide::application::SnapshotStore::new(
        services.config().sources.snapshot_path.clone(),
    )
    .load()
    .unwrap()
    .unwrap();
    assert_eq!(restored.open_count(), 0);
    assert_eq!(restored.risk().daily_pnl(), dec!(-16.00));
}

#[tokio::test]
async fn low_confidence_signals_are_rejected_before_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let (factory, _remote) = channel_factory();
    let venue: Arc<dyn ExecutionVenue> =
        Arc::new(ScriptedVenue::quoting("jup", dec!(100), dec!(1)));

    let services = Arc::new(
        Services::from_config(test_config(&dir), factory, vec![venue]).unwrap(),
    );
    let pipeline = Pipeline::new(Arc::clone(&services));

    pipeline
        .run(FixedSignals(vec![domain::signal("mint-1", dec!(0.2))]))
        .await;

    assert_eq!(services.ledger().open_count(), 0);
    assert_eq!(services.metrics().snapshot().signals_rejected, 1);
}

#[tokio::test]
async fn position_ceiling_stops_the_flow() {
    let dir = tempfile::tempdir().unwrap();
    let (factory, _remote) = channel_factory();
    let venue: Arc<dyn ExecutionVenue> =
        Arc::new(ScriptedVenue::quoting("jup", dec!(100), dec!(1)));

    let mut config = test_config(&dir);
    config.risk.max_open_positions = 1;
    let services = Arc::new(Services::from_config(config, factory, vec![venue]).unwrap());
    let pipeline = Pipeline::new(Arc::clone(&services));

    pipeline
        .run(FixedSignals(vec![
            domain::signal("mint-1", dec!(0.9)),
            domain::signal("mint-2", dec!(0.9)),
        ]))
        .await;

    assert_eq!(services.ledger().open_count(), 1);
    assert_eq!(services.metrics().snapshot().signals_rejected, 1);
}

#[tokio::test]
async fn abandoned_feed_releases_its_subscription() {
    use riptide::testkit::transport::connect_refused;
    use riptide::testkit::ScriptedTransport;

    let dir = tempfile::tempdir().unwrap();
    let factory: TransportFactory = Arc::new(|url| {
        Box::new(
            ScriptedTransport::new().with_connect_results(vec![Err(connect_refused(url))]),
        )
    });
    let mut config = test_config(&dir);
    config.reconnection = riptide::testkit::config::reconnection();

    let services = Arc::new(Services::from_config(config, factory, Vec::new()).unwrap());
    let mut pipeline = Pipeline::new(Arc::clone(&services));
    pipeline.start();

    // Once the reconnect budget runs out the feed task gives up and
    // drops its handle instead of waiting on a dead stream.
    wait_until(|| services.pool().stats().reconnects >= 1).await;
    wait_until(|| services.pool().subscriber_count("ws://feed.test") == 0).await;
    assert_eq!(services.pool().stats().active_connections, 0);
    pipeline.shutdown();
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
