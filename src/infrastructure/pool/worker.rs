//! Connection worker: owns one transport and drives its whole lifecycle.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{PoolConfig, ReconnectionConfig};
use crate::domain::ConnState;
use crate::error::ConnectionError;
use crate::infrastructure::backoff::Backoff;
use crate::port::{StreamTransport, TransportEvent, TransportFactory};

use super::{PoolCounters, StreamEvent};

/// How a connected session ended.
enum SessionEnd {
    RemoteClosed(String),
    HeartbeatTimeout,
    SendFailed,
    PoolReleased,
}

/// What woke the session loop.
enum Wake {
    Inbound(Option<TransportEvent>),
    Outbound(Option<String>),
    Deadline,
}

pub(super) async fn run(
    url: String,
    factory: TransportFactory,
    pool: PoolConfig,
    reconnection: ReconnectionConfig,
    events: broadcast::Sender<StreamEvent>,
    mut outbound: mpsc::Receiver<String>,
    counters: Arc<PoolCounters>,
) {
    let heartbeat = Duration::from_millis(pool.heartbeat_interval_ms);
    let pong_timeout = Duration::from_millis(pool.pong_timeout_ms);
    let mut backoff = Backoff::new(reconnection);

    loop {
        let _ = events.send(StreamEvent::State(ConnState::Connecting));
        let mut transport = (factory)(&url);

        match transport.connect().await {
            Ok(()) => {
                info!(url = %url, "Stream connected");
                let _ = events.send(StreamEvent::State(ConnState::Open));
                let started = Instant::now();
                let end = drive_session(
                    transport.as_mut(),
                    &events,
                    &mut outbound,
                    heartbeat,
                    pong_timeout,
                )
                .await;
                let _ = events.send(StreamEvent::State(ConnState::Closed));

                // A session that survived a full heartbeat interval counts
                // as stable and restarts the backoff schedule.
                if started.elapsed() >= heartbeat {
                    backoff.reset();
                }

                match end {
                    SessionEnd::RemoteClosed(reason) => {
                        warn!(url = %url, reason = %reason, "Stream closed by remote")
                    }
                    SessionEnd::HeartbeatTimeout => {
                        warn!(
                            url = %url,
                            timeout_ms = pong_timeout.as_millis() as u64,
                            "Heartbeat timed out, forcing reconnect"
                        )
                    }
                    SessionEnd::SendFailed => {
                        warn!(url = %url, "Outbound send failed, forcing reconnect")
                    }
                    SessionEnd::PoolReleased => {
                        debug!(url = %url, "Pool released connection, worker exiting");
                        return;
                    }
                }
            }
            Err(error) => {
                warn!(url = %url, error = %error, "Connect attempt failed");
            }
        }

        if backoff.exhausted() {
            let attempts = backoff.attempts();
            error!(url = %url, attempts, "Reconnect budget exhausted, stream failed");
            let _ = events.send(StreamEvent::Failed(ConnectionError::AttemptsExhausted {
                url: url.clone(),
                attempts,
            }));
            let _ = events.send(StreamEvent::State(ConnState::Failed));
            return;
        }

        let delay = backoff.next_delay();
        counters.reconnects.fetch_add(1, Ordering::Relaxed);
        debug!(
            url = %url,
            delay_ms = delay.as_millis() as u64,
            attempt = backoff.attempts(),
            "Reconnecting after delay"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Drive one connected session until it ends.
///
/// The select only decides what woke us; the transport is touched
/// afterwards so inbound reads and outbound writes never hold it at the
/// same time.
async fn drive_session(
    transport: &mut dyn StreamTransport,
    events: &broadcast::Sender<StreamEvent>,
    outbound: &mut mpsc::Receiver<String>,
    heartbeat: Duration,
    pong_timeout: Duration,
) -> SessionEnd {
    let mut next_ping = Instant::now() + heartbeat;
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let deadline = match pong_deadline {
            Some(at) => at.min(next_ping),
            None => next_ping,
        };

        let wake = tokio::select! {
            event = transport.next_event() => Wake::Inbound(event),
            frame = outbound.recv() => Wake::Outbound(frame),
            () = tokio::time::sleep_until(deadline) => Wake::Deadline,
        };

        match wake {
            Wake::Inbound(Some(TransportEvent::Text(text))) => {
                let _ = events.send(StreamEvent::Text(text));
            }
            Wake::Inbound(Some(TransportEvent::Pong)) => {
                pong_deadline = None;
            }
            Wake::Inbound(Some(TransportEvent::Closed { reason })) => {
                return SessionEnd::RemoteClosed(reason);
            }
            Wake::Inbound(None) => {
                return SessionEnd::RemoteClosed("stream ended".to_string());
            }
            Wake::Outbound(Some(frame)) => {
                if let Err(error) = transport.send(&frame).await {
                    warn!(error = %error, "Failed to send outbound frame");
                    return SessionEnd::SendFailed;
                }
            }
            Wake::Outbound(None) => return SessionEnd::PoolReleased,
            Wake::Deadline => {
                if let Some(at) = pong_deadline {
                    if Instant::now() >= at {
                        return SessionEnd::HeartbeatTimeout;
                    }
                }
                if Instant::now() >= next_ping {
                    if transport.ping().await.is_err() {
                        return SessionEnd::SendFailed;
                    }
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + pong_timeout);
                    }
                    next_ping = Instant::now() + heartbeat;
                }
            }
        }
    }
}
