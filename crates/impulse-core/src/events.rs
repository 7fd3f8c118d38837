//! Best-effort observability sink.
//!
//! The engine publishes [`EngineEvent`]s on a broadcast channel and never
//! waits for consumers. A subscriber that falls more than
//! [`BROADCAST_CAPACITY`] events behind receives
//! [`broadcast::error::RecvError::Lagged`] and skips ahead.

use tokio::sync::broadcast;
use tracing::trace;

use impulse_types::EngineEvent;

/// Capacity of the event broadcast channel.
pub const BROADCAST_CAPACITY: usize = 256;

/// Fan-out channel for engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// A bus holding up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns the number of subscribers reached; 0 when
    /// nobody listens, which is not an error.
    pub fn publish(&self, event: EngineEvent) -> usize {
        trace!(agent_id = %event.agent_id, kind = ?event.kind, "publishing event");
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BROADCAST_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use impulse_types::{AgentId, EngineEventKind};

    use super::*;

    fn event() -> EngineEvent {
        EngineEvent::new(
            AgentId::new(),
            EngineEventKind::NeedThresholdCrossed,
            None,
            Utc::now(),
            serde_json::Value::Null,
        )
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(event()), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let sent = event();
        assert_eq!(bus.publish(sent.clone()), 1);
        let got = rx.recv().await;
        assert_eq!(got.ok(), Some(sent));
    }
}
