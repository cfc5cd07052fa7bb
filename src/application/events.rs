//! Lifecycle event bus.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::LifecycleEvent;

/// Broadcast bus for pipeline lifecycle events.
///
/// Publishing never blocks and never fails; events sent with no observers
/// are simply discarded.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current observers.
    pub fn publish(&self, event: LifecycleEvent) {
        trace!(event = ?event, "Lifecycle event");
        let _ = self.sender.send(event);
    }

    /// Observe all lifecycle events from this point on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnState, LifecycleEvent};
    use chrono::Utc;

    #[tokio::test]
    async fn observers_receive_published_events() {
        let bus = EventBus::new(16);
        let mut observer = bus.subscribe();
        bus.publish(LifecycleEvent::ConnectionStateChanged {
            url: "wss://feed".into(),
            state: ConnState::Open,
            at: Utc::now(),
        });
        let event = observer.recv().await.unwrap();
        assert!(matches!(
            event,
            LifecycleEvent::ConnectionStateChanged {
                state: ConnState::Open,
                ..
            }
        ));
    }

    #[test]
    fn publish_without_observers_is_fine() {
        let bus = EventBus::new(16);
        bus.publish(LifecycleEvent::ConnectionStateChanged {
            url: "wss://feed".into(),
            state: ConnState::Closed,
            at: Utc::now(),
        });
    }
}
