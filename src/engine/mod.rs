mod catalog;
mod conflict;
mod error;
mod mutations;
mod queries;
mod validate;

pub use conflict::{
    check_availability, conflict_window, intervals_conflict, lookup_window, Conflict,
};
pub use error::{EngineError, ValidationError};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use ulid::Ulid;

use crate::model::*;
use crate::observability::{self, CONFLICTS_TOTAL, CONSTRAINT_VIOLATIONS_TOTAL};
use crate::publisher::EventPublisher;
use crate::store::{AppointmentStore, ServiceStore};

/// Appointment lifecycle manager.
///
/// Runs every mutation as check → persist → publish against its ports.
/// Holds no state of its own; concurrent callers are serialized only by
/// whatever the store enforces.
pub struct Engine {
    pub(super) appointments: Arc<dyn AppointmentStore>,
    pub(super) services: Arc<dyn ServiceStore>,
    pub(super) publisher: EventPublisher,
}

impl Engine {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        services: Arc<dyn ServiceStore>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            appointments,
            services,
            publisher,
        }
    }

    /// Run `op`, recording its count and latency under `operation`.
    pub(super) async fn observed<T>(
        &self,
        operation: &'static str,
        op: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        let started = Instant::now();
        let result = op.await;
        match &result {
            Err(EngineError::ResourceConflict(_)) => {
                metrics::counter!(CONFLICTS_TOTAL).increment(1);
            }
            Err(EngineError::ConstraintViolation(c)) => {
                metrics::counter!(CONSTRAINT_VIOLATIONS_TOTAL).increment(1);
                tracing::warn!(
                    calendar = %c.calendar,
                    existing = %c.existing,
                    "{operation}: store rejected overlapping write"
                );
            }
            _ => {}
        }
        observability::record_operation(operation, started, result.is_ok());
        result
    }

    /// Fail with `ResourceConflict` if `span` collides with another
    /// appointment on `calendar` within the candidate's lookup window.
    pub(super) async fn ensure_available(
        &self,
        calendar: CalendarKey,
        span: &Span,
        exclude: Option<Ulid>,
    ) -> Result<(), EngineError> {
        let window = lookup_window(span);
        let existing = self
            .appointments
            .find_by_calendar_and_window(calendar, window)
            .await?;
        check_availability(calendar, span, &existing, exclude).map_err(|c| {
            tracing::debug!(
                calendar = %calendar,
                existing = %c.existing,
                "requested slot [{}, {}) not available",
                span.start,
                span.end
            );
            EngineError::ResourceConflict(c)
        })
    }

    /// Publish after a committed write. A failure is reported, the write stays.
    pub(super) async fn publish(
        &self,
        kind: ChangeKind,
        payload: impl Into<Payload>,
    ) -> Result<(), EngineError> {
        self.publisher.publish(kind, payload).await?;
        Ok(())
    }
}
