//! Connection pool behavior: sharing, reconnection, heartbeats.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use riptide::config::PoolConfig;
use riptide::domain::{ConnState, SubscriberId};
use riptide::error::ConnectionError;
use riptide::infrastructure::{ConnectionPool, StreamEvent};
use riptide::port::TransportFactory;
use riptide::testkit::transport::connect_refused;
use riptide::testkit::{config, ChannelTransport, ScriptedTransport};

/// A factory that builds a fresh [`ScriptedTransport`] per connection
/// attempt, sharing one connect counter across all of them.
fn counting_factory(
    build: impl Fn() -> ScriptedTransport + Send + Sync + 'static,
) -> (TransportFactory, Arc<AtomicU32>) {
    let connects = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&connects);
    let factory: TransportFactory = Arc::new(move |_url| {
        let mut transport = build();
        transport.set_connect_count(Arc::clone(&counter));
        Box::new(transport)
    });
    (factory, connects)
}

/// A factory that hands out a single pre-built transport, then panics.
/// For tests where reconnection must not happen.
fn single_use_factory(transport: ChannelTransport) -> TransportFactory {
    let slot = Mutex::new(Some(transport));
    Arc::new(move |_url| {
        let transport = slot
            .lock()
            .unwrap()
            .take()
            .expect("transport requested twice");
        Box::new(transport)
    })
}

#[tokio::test]
async fn two_subscribers_share_one_physical_connection() {
    let (factory, connects) = counting_factory(ScriptedTransport::new);
    let pool = ConnectionPool::new(factory, config::pool(), config::reconnection());

    let a = pool.acquire("ws://feed", SubscriberId::new("a"));
    let b = pool.acquire("ws://feed", SubscriberId::new("b"));
    assert_eq!(pool.subscriber_count("ws://feed"), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(pool.stats().active_connections, 1);

    drop(a);
    assert_eq!(pool.subscriber_count("ws://feed"), 1);
    assert_eq!(pool.stats().active_connections, 1);

    drop(b);
    assert_eq!(pool.subscriber_count("ws://feed"), 0);
    assert_eq!(pool.stats().active_connections, 0);
}

#[tokio::test]
async fn distinct_urls_get_distinct_connections() {
    let (factory, connects) = counting_factory(ScriptedTransport::new);
    let pool = ConnectionPool::new(factory, config::pool(), config::reconnection());

    let _a = pool.acquire("ws://feed-1", SubscriberId::new("a"));
    let _b = pool.acquire("ws://feed-2", SubscriberId::new("a"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().active_connections, 2);
}

#[tokio::test]
async fn frames_fan_out_to_every_subscriber() {
    let (transport, remote) = ChannelTransport::pair();
    let pool = ConnectionPool::new(
        single_use_factory(transport),
        config::pool(),
        config::reconnection(),
    );

    let mut a = pool.acquire("ws://feed", SubscriberId::new("a"));
    let mut b = pool.acquire("ws://feed", SubscriberId::new("b"));

    // Both handles observe the connection coming up before any frame.
    wait_for_open(&mut a).await;
    wait_for_open(&mut b).await;

    remote.push_text(r#"{"room":"price:m1","content":{"price":"1.0"}}"#);

    assert_eq!(next_text(&mut a).await, r#"{"room":"price:m1","content":{"price":"1.0"}}"#);
    assert_eq!(next_text(&mut b).await, r#"{"room":"price:m1","content":{"price":"1.0"}}"#);
}

#[tokio::test]
async fn outbound_frames_reach_the_transport() {
    let (transport, remote) = ChannelTransport::pair();
    let pool = ConnectionPool::new(
        single_use_factory(transport),
        config::pool(),
        config::reconnection(),
    );

    let mut handle = pool.acquire("ws://feed", SubscriberId::new("a"));
    wait_for_open(&mut handle).await;

    handle.send(r#"{"join":"whale_feed"}"#).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.sent(), vec![r#"{"join":"whale_feed"}"#.to_string()]);
}

#[tokio::test]
async fn remote_close_triggers_reconnect() {
    let (factory, connects) = counting_factory(|| {
        ScriptedTransport::new().with_frames(vec![riptide::port::TransportEvent::Closed {
            reason: "server restart".to_string(),
        }])
    });
    let pool = ConnectionPool::new(factory, config::pool(), config::reconnection());

    let mut handle = pool.acquire("ws://feed", SubscriberId::new("a"));

    // Every session closes immediately, so the worker burns through its
    // reconnect budget and gives up.
    let err = wait_for_failure(&mut handle).await;
    match err {
        ConnectionError::AttemptsExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("wrong error: {other}"),
    }
    assert!(connects.load(Ordering::SeqCst) > 1);
    assert!(pool.stats().reconnects >= 1);
}

#[tokio::test]
async fn failed_connects_exhaust_the_budget() {
    let (factory, connects) = counting_factory(|| {
        ScriptedTransport::new().with_connect_results(vec![Err(connect_refused("ws://feed"))])
    });
    let pool = ConnectionPool::new(factory, config::pool(), config::reconnection());

    let mut handle = pool.acquire("ws://feed", SubscriberId::new("a"));
    let err = wait_for_failure(&mut handle).await;
    assert!(matches!(err, ConnectionError::AttemptsExhausted { .. }));
    // Initial attempt plus the full reconnect budget.
    assert_eq!(connects.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn acquire_after_exhaustion_respawns_the_worker() {
    let (factory, connects) = counting_factory(|| {
        ScriptedTransport::new().with_connect_results(vec![Err(connect_refused("ws://feed"))])
    });
    let pool = ConnectionPool::new(factory, config::pool(), config::reconnection());

    let mut first = pool.acquire("ws://feed", SubscriberId::new("a"));
    let err = wait_for_failure(&mut first).await;
    assert!(matches!(err, ConnectionError::AttemptsExhausted { .. }));
    assert_eq!(connects.load(Ordering::SeqCst), 4);

    // A later subscriber must not join the dead entry; it gets a fresh
    // worker with a fresh reconnect budget.
    let mut second = pool.acquire("ws://feed", SubscriberId::new("b"));
    let err = wait_for_failure(&mut second).await;
    assert!(matches!(err, ConnectionError::AttemptsExhausted { .. }));
    assert_eq!(connects.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn clean_release_is_not_counted_as_reconnect() {
    let (transport, _remote) = ChannelTransport::pair();
    let pool = ConnectionPool::new(
        single_use_factory(transport),
        config::pool(),
        config::reconnection(),
    );

    let mut handle = pool.acquire("ws://feed", SubscriberId::new("a"));
    wait_for_open(&mut handle).await;
    drop(handle);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.stats().reconnects, 0);
}

#[tokio::test]
async fn unanswered_heartbeat_forces_reconnect() {
    let (factory, _connects) = counting_factory(|| ScriptedTransport::new().without_pongs());
    let pool_config = PoolConfig {
        heartbeat_interval_ms: 20,
        pong_timeout_ms: 10,
        ..config::pool()
    };
    let pool = ConnectionPool::new(factory, pool_config, config::reconnection());

    let _handle = pool.acquire("ws://feed", SubscriberId::new("a"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(pool.stats().reconnects >= 1);
}

#[tokio::test]
async fn answered_heartbeats_keep_the_session_alive() {
    let (factory, _connects) = counting_factory(ScriptedTransport::new);
    let pool_config = PoolConfig {
        heartbeat_interval_ms: 20,
        pong_timeout_ms: 10,
        ..config::pool()
    };
    let pool = ConnectionPool::new(factory, pool_config, config::reconnection());

    let _handle = pool.acquire("ws://feed", SubscriberId::new("a"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(pool.stats().reconnects, 0);
}

async fn wait_for_open(handle: &mut riptide::infrastructure::StreamHandle) {
    loop {
        match handle.recv().await {
            Some(StreamEvent::State(ConnState::Open)) => return,
            Some(_) => {}
            None => panic!("stream ended before opening"),
        }
    }
}

async fn next_text(handle: &mut riptide::infrastructure::StreamHandle) -> String {
    loop {
        match handle.recv().await {
            Some(StreamEvent::Text(text)) => return text,
            Some(_) => {}
            None => panic!("stream ended before a text frame"),
        }
    }
}

async fn wait_for_failure(
    handle: &mut riptide::infrastructure::StreamHandle,
) -> ConnectionError {
    loop {
        match handle.recv().await {
            Some(StreamEvent::Failed(err)) => return err,
            Some(_) => {}
            None => panic!("stream ended without reporting failure"),
        }
    }
}
