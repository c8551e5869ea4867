use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{ChangeEvent, Topic};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Outbound port for change events. One fixed topic per entity type.
///
/// Delivery happens inline with the mutation that produced the event. A
/// retrying or outbox-backed implementation plugs in here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, topic: Topic, event: &ChangeEvent) -> Result<(), TransportError>;
}

/// In-process fan-out over tokio broadcast channels, one per topic.
pub struct BroadcastTransport {
    channels: DashMap<Topic, broadcast::Sender<ChangeEvent>>,
    capacity: usize,
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic. Creates the channel if needed.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<ChangeEvent> {
        let sender = self
            .channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        sender.subscribe()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channels
            .get(&topic)
            .map_or(0, |s| s.receiver_count())
    }
}

#[async_trait]
impl Transport for BroadcastTransport {
    /// No-op if nobody is listening.
    async fn send(&self, topic: Topic, event: &ChangeEvent) -> Result<(), TransportError> {
        if let Some(sender) = self.channels.get(&topic) {
            // Err only means every receiver has been dropped since subscribing.
            let _ = sender.send(event.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn deleted(id: Ulid) -> ChangeEvent {
        ChangeEvent {
            timestamp: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            kind: ChangeKind::Deleted,
            payload: Payload::Appointment(AppointmentPayload::tombstone(id)),
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let transport = BroadcastTransport::default();
        let mut rx = transport.subscribe(Topic::AppointmentChanged);

        let event = deleted(Ulid::new());
        transport
            .send(Topic::AppointmentChanged, &event)
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let transport = BroadcastTransport::default();
        transport
            .send(Topic::AppointmentChanged, &deleted(Ulid::new()))
            .await
            .unwrap();
        assert_eq!(transport.subscriber_count(Topic::AppointmentChanged), 0);
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let transport = BroadcastTransport::default();
        let mut services = transport.subscribe(Topic::ServiceChanged);
        let _appointments = transport.subscribe(Topic::AppointmentChanged);

        transport
            .send(Topic::AppointmentChanged, &deleted(Ulid::new()))
            .await
            .unwrap();

        assert!(matches!(
            services.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
