use std::sync::Arc;

use crate::clock::Clock;
use crate::model::{ChangeEvent, ChangeKind, Payload};
use crate::observability::{EVENTS_PUBLISHED_TOTAL, PUBLISH_FAILURES_TOTAL};
use crate::transport::{Transport, TransportError};

/// Turns committed changes into [`ChangeEvent`]s and hands them to the transport.
pub struct EventPublisher {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl EventPublisher {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock }
    }

    pub fn build(&self, kind: ChangeKind, payload: Payload) -> ChangeEvent {
        ChangeEvent {
            timestamp: self.clock.now(),
            kind,
            payload,
        }
    }

    /// Build and deliver one event on the payload's topic.
    /// Failures are returned as-is; nothing is retried here.
    pub async fn publish(
        &self,
        kind: ChangeKind,
        payload: impl Into<Payload>,
    ) -> Result<ChangeEvent, TransportError> {
        let event = self.build(kind, payload.into());
        let topic = event.payload.topic();
        match self.transport.send(topic, &event).await {
            Ok(()) => {
                metrics::counter!(EVENTS_PUBLISHED_TOTAL, "topic" => topic.as_str(), "kind" => kind.as_str())
                    .increment(1);
                tracing::debug!(
                    topic = topic.as_str(),
                    kind = kind.as_str(),
                    id = %event.payload.id(),
                    "change event published"
                );
                Ok(event)
            }
            Err(e) => {
                metrics::counter!(PUBLISH_FAILURES_TOTAL, "topic" => topic.as_str()).increment(1);
                tracing::warn!(
                    topic = topic.as_str(),
                    kind = kind.as_str(),
                    id = %event.payload.id(),
                    "change event not delivered: {e}"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::*;
    use crate::transport::BroadcastTransport;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use ulid::Ulid;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _topic: Topic, _event: &ChangeEvent) -> Result<(), TransportError> {
            Err(TransportError("broker unreachable".into()))
        }
    }

    fn noon() -> Timestamp {
        NaiveDate::from_ymd_opt(2026, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn stamps_event_with_clock_and_routes_by_payload() {
        let transport = Arc::new(BroadcastTransport::default());
        let mut appointments = transport.subscribe(Topic::AppointmentChanged);
        let mut services = transport.subscribe(Topic::ServiceChanged);
        let publisher = EventPublisher::new(transport.clone(), Arc::new(FixedClock::new(noon())));

        let id = Ulid::new();
        publisher
            .publish(ChangeKind::Deleted, ServicePayload::tombstone(id))
            .await
            .unwrap();

        let event = services.recv().await.unwrap();
        assert_eq!(event.timestamp, noon());
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert_eq!(event.payload.id(), id);
        assert!(appointments.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let publisher = EventPublisher::new(Arc::new(Unreachable), Arc::new(FixedClock::new(noon())));
        let err = publisher
            .publish(ChangeKind::Created, AppointmentPayload::tombstone(Ulid::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broker unreachable"));
    }
}
