//! Event normalization and fan-out.
//!
//! Upstream feeds speak two dialects: room-based frames
//! (`{"room": ..., "content": ...}`) and typed frames
//! (`{"type": ..., "data": ...}`). The router canonicalizes both into
//! [`MarketEvent`]s and fans each event kind out on its own broadcast
//! channel, so delivery to any one subscriber preserves arrival order.
//! Subscriber buffers are bounded; a lagging subscriber loses the oldest
//! events and the loss is counted on the router.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::domain::{EventKind, InstrumentId, MarketEvent, TradeSide};

/// Point-in-time router statistics.
#[derive(Debug, Clone, Copy)]
pub struct RouterStats {
    pub published: u64,
    pub unrecognized: u64,
    pub dropped: u64,
}

struct RouterInner {
    channels: [broadcast::Sender<MarketEvent>; 4],
    published: AtomicU64,
    unrecognized: AtomicU64,
    dropped: AtomicU64,
}

fn kind_index(kind: EventKind) -> usize {
    match kind {
        EventKind::PriceTick => 0,
        EventKind::Surge => 1,
        EventKind::WhaleActivity => 2,
        EventKind::FeeUpdate => 3,
    }
}

/// Canonicalizes raw feed frames and routes them to subscribers by kind.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<RouterInner>,
}

impl EventRouter {
    #[must_use]
    pub fn new(channel_capacity: usize) -> Self {
        let channels = std::array::from_fn(|_| broadcast::channel(channel_capacity).0);
        Self {
            inner: Arc::new(RouterInner {
                channels,
                published: AtomicU64::new(0),
                unrecognized: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Canonicalize one raw frame. Unknown shapes are counted and yield
    /// `None`.
    pub fn normalize(&self, raw: &str) -> Option<MarketEvent> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => {
                self.inner.unrecognized.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let event = normalize_value(&value);
        if event.is_none() {
            self.inner.unrecognized.fetch_add(1, Ordering::Relaxed);
            trace!(frame = %raw, "Unrecognized frame shape, skipped");
        }
        event
    }

    /// Canonicalize and publish one raw frame.
    pub fn ingest(&self, raw: &str) {
        if let Some(event) = self.normalize(raw) {
            self.publish(event);
        }
    }

    /// Publish a canonical event to all subscribers of its kind.
    pub fn publish(&self, event: MarketEvent) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        // Send only fails when nobody subscribes to this kind.
        let _ = self.inner.channels[kind_index(event.kind())].send(event);
    }

    /// Subscribe to all events of one kind, in arrival order.
    #[must_use]
    pub fn subscribe(&self, kind: EventKind) -> EventStream {
        EventStream {
            receiver: self.inner.channels[kind_index(kind)].subscribe(),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Events lost to lagging subscribers since startup.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Point-in-time statistics.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            published: self.inner.published.load(Ordering::Relaxed),
            unrecognized: self.inner.unrecognized.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

/// A subscriber's ordered view of one event kind.
pub struct EventStream {
    receiver: broadcast::Receiver<MarketEvent>,
    inner: Arc<RouterInner>,
}

impl EventStream {
    /// Next event, or `None` once the router is gone. Falling behind the
    /// bounded buffer drops the oldest events, counted on the router.
    pub async fn recv(&mut self) -> Option<MarketEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.inner.dropped.fetch_add(missed, Ordering::Relaxed);
                    debug!(missed, "Event subscriber lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

fn normalize_value(value: &Value) -> Option<MarketEvent> {
    if let Some(room) = value.get("room").and_then(Value::as_str) {
        let content = value.get("content")?;
        return normalize_payload(room, content);
    }
    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        let data = value.get("data")?;
        return normalize_payload(kind, data);
    }
    None
}

fn normalize_payload(label: &str, payload: &Value) -> Option<MarketEvent> {
    let observed_at = Utc::now();
    if let Some(mint) = label.strip_prefix("price:") {
        return Some(MarketEvent::PriceTick {
            instrument: InstrumentId::new(mint),
            price: decimal_field(payload, "price")?,
            observed_at,
        });
    }
    match label {
        "price" => Some(MarketEvent::PriceTick {
            instrument: instrument_field(payload)?,
            price: decimal_field(payload, "price")?,
            observed_at,
        }),
        "surge" | "token_updates" | "new_pairs" => Some(MarketEvent::Surge {
            instrument: instrument_field(payload)?,
            volume: decimal_field(payload, "volume")?,
            observed_at,
        }),
        "whale" | "whale_feed" => Some(MarketEvent::WhaleActivity {
            instrument: instrument_field(payload)?,
            notional: decimal_field(payload, "amount")?,
            side: side_field(payload),
            observed_at,
        }),
        "fee" | "fees" => Some(MarketEvent::FeeUpdate {
            instrument: instrument_field(payload)?,
            fee: decimal_field(payload, "fee")?,
            observed_at,
        }),
        _ => None,
    }
}

fn instrument_field(payload: &Value) -> Option<InstrumentId> {
    payload
        .get("token")
        .or_else(|| payload.get("mint"))
        .and_then(Value::as_str)
        .map(InstrumentId::new)
}

/// Accept both string and numeric encodings; numbers go through their
/// textual form so floats do not pick up binary noise.
fn decimal_field(payload: &Value, key: &str) -> Option<Decimal> {
    match payload.get(key)? {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn side_field(payload: &Value) -> TradeSide {
    match payload.get("side").and_then(Value::as_str) {
        Some("sell") => TradeSide::Sell,
        _ => TradeSide::Buy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn normalizes_room_price_frame() {
        let router = EventRouter::new(16);
        let event = router
            .normalize(r#"{"room":"price:MINT1","content":{"price":"1.25"}}"#)
            .unwrap();
        match event {
            MarketEvent::PriceTick { instrument, price, .. } => {
                assert_eq!(instrument.as_str(), "MINT1");
                assert_eq!(price, dec!(1.25));
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn normalizes_typed_whale_frame() {
        let router = EventRouter::new(16);
        let event = router
            .normalize(r#"{"type":"whale","data":{"token":"MINT2","amount":5000,"side":"sell"}}"#)
            .unwrap();
        match event {
            MarketEvent::WhaleActivity { instrument, notional, side, .. } => {
                assert_eq!(instrument.as_str(), "MINT2");
                assert_eq!(notional, dec!(5000));
                assert_eq!(side, TradeSide::Sell);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn normalizes_whale_room_frame() {
        let router = EventRouter::new(16);
        let event = router
            .normalize(r#"{"room":"whale_feed","content":{"token":"MINT3","amount":"250.5"}}"#)
            .unwrap();
        match event {
            MarketEvent::WhaleActivity { notional, side, .. } => {
                assert_eq!(notional, dec!(250.5));
                assert_eq!(side, TradeSide::Buy);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn unknown_shapes_are_counted_and_skipped() {
        let router = EventRouter::new(16);
        assert!(router.normalize("not json").is_none());
        assert!(router.normalize(r#"{"hello":"world"}"#).is_none());
        assert!(router
            .normalize(r#"{"room":"unknown_room","content":{}}"#)
            .is_none());
        assert_eq!(router.stats().unrecognized, 3);
    }

    #[tokio::test]
    async fn subscribers_only_see_their_kind() {
        let router = EventRouter::new(16);
        let mut ticks = router.subscribe(EventKind::PriceTick);
        router.ingest(r#"{"room":"whale_feed","content":{"token":"M","amount":"1"}}"#);
        router.ingest(r#"{"room":"price:M","content":{"price":"2"}}"#);
        let event = ticks.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::PriceTick);
    }

    #[tokio::test]
    async fn delivery_preserves_arrival_order() {
        let router = EventRouter::new(16);
        let mut ticks = router.subscribe(EventKind::PriceTick);
        for i in 1..=3 {
            router.ingest(&format!(r#"{{"room":"price:M","content":{{"price":"{i}"}}}}"#));
        }
        for i in 1..=3 {
            match ticks.recv().await.unwrap() {
                MarketEvent::PriceTick { price, .. } => {
                    assert_eq!(price, Decimal::from(i));
                }
                other => panic!("wrong event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest_and_is_counted() {
        let router = EventRouter::new(2);
        let mut ticks = router.subscribe(EventKind::PriceTick);
        for i in 1..=5 {
            router.publish(MarketEvent::PriceTick {
                instrument: InstrumentId::new("M"),
                price: Decimal::from(i),
                observed_at: Utc::now(),
            });
        }
        // Buffer holds the newest two; the first recv reports the lag.
        match ticks.recv().await.unwrap() {
            MarketEvent::PriceTick { price, .. } => assert_eq!(price, dec!(4)),
            other => panic!("wrong event: {other:?}"),
        }
        assert_eq!(router.dropped_events(), 3);
    }
}
