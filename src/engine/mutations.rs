use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;

use super::validate::{build_candidate, check_body_id, check_patch_id, merge_patch};
use super::{Engine, EngineError, ValidationError};

impl Engine {
    /// Check availability, persist, publish `Created`.
    pub async fn create_appointment(
        &self,
        input: AppointmentInput,
    ) -> Result<AppointmentView, EngineError> {
        debug!(?input, "request to create appointment");
        self.observed("create_appointment", async move {
            if input.id.is_some() {
                return Err(ValidationError::IdPresent.into());
            }
            let candidate = build_candidate(input)?;
            self.ensure_available(candidate.calendar, &candidate.span, None)
                .await?;
            let appointment = self.appointments.insert(candidate).await?;
            info!(
                id = %appointment.id,
                calendar = %appointment.calendar,
                "appointment created"
            );
            self.publish(ChangeKind::Created, AppointmentPayload::from(&appointment))
                .await?;
            Ok(AppointmentView::from(&appointment))
        })
        .await
    }

    /// Full replace. The appointment's own stored interval never counts as a conflict.
    pub async fn update_appointment(
        &self,
        id: Ulid,
        input: AppointmentInput,
    ) -> Result<AppointmentView, EngineError> {
        debug!(%id, ?input, "request to update appointment");
        self.observed("update_appointment", async move {
            check_body_id(id, input.id)?;
            if self.appointments.find_by_id(id).await?.is_none() {
                return Err(EngineError::NotFound(id));
            }
            let candidate = build_candidate(input)?;
            self.ensure_available(candidate.calendar, &candidate.span, Some(id))
                .await?;
            let appointment = self.appointments.replace(candidate.with_id(id)).await?;
            info!(%id, calendar = %appointment.calendar, "appointment updated");
            self.publish(ChangeKind::Updated, AppointmentPayload::from(&appointment))
                .await?;
            Ok(AppointmentView::from(&appointment))
        })
        .await
    }

    /// Merge present fields. Availability is re-checked only if the patch
    /// moves the appointment in time or to another calendar.
    pub async fn partial_update_appointment(
        &self,
        id: Ulid,
        patch: AppointmentPatch,
    ) -> Result<AppointmentView, EngineError> {
        debug!(%id, ?patch, "request to partially update appointment");
        self.observed("partial_update_appointment", async move {
            check_patch_id(id, patch.id)?;
            let current = self
                .appointments
                .find_by_id(id)
                .await?
                .ok_or(EngineError::NotFound(id))?;
            let merged = merge_patch(&current, patch)?;
            if merged.span != current.span || merged.calendar != current.calendar {
                self.ensure_available(merged.calendar, &merged.span, Some(id))
                    .await?;
            }
            let appointment = self.appointments.replace(merged).await?;
            info!(%id, "appointment partially updated");
            self.publish(ChangeKind::Updated, AppointmentPayload::from(&appointment))
                .await?;
            Ok(AppointmentView::from(&appointment))
        })
        .await
    }

    /// Idempotent. Always publishes `Deleted`, from a tombstone if the row is
    /// already gone, then deletes regardless.
    pub async fn delete_appointment(&self, id: Ulid) -> Result<(), EngineError> {
        debug!(%id, "request to delete appointment");
        self.observed("delete_appointment", async move {
            let payload = match self.appointments.find_by_id(id).await? {
                Some(existing) => AppointmentPayload::from(&existing),
                None => AppointmentPayload::tombstone(id),
            };
            self.publish(ChangeKind::Deleted, payload).await?;
            let existed = self.appointments.delete_by_id(id).await?;
            info!(%id, existed, "appointment deleted");
            Ok(())
        })
        .await
    }

    /// Bulk delete. No per-row events.
    pub async fn delete_all_appointments(&self) -> Result<(), EngineError> {
        debug!("request to delete all appointments");
        self.observed("delete_all_appointments", async move {
            let removed = self.appointments.delete_all().await?;
            info!(removed, "all appointments deleted");
            Ok(())
        })
        .await
    }
}
