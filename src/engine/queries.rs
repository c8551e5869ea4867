use chrono::TimeDelta;
use tracing::debug;
use ulid::Ulid;

use crate::limits::{MAX_PAGE_SIZE, MAX_QUERY_RANGE_DAYS};
use crate::model::*;

use super::{Engine, EngineError};

/// Zero-sized pages are bumped to one row, oversized pages are capped.
pub(super) fn clamp_page(page: PageRequest) -> PageRequest {
    PageRequest::new(page.page, page.size.clamp(1, MAX_PAGE_SIZE))
}

impl Engine {
    pub async fn get_appointment(&self, id: Ulid) -> Result<AppointmentView, EngineError> {
        debug!(%id, "request to get appointment");
        self.observed("get_appointment", async move {
            let appointment = self
                .appointments
                .find_by_id(id)
                .await?
                .ok_or(EngineError::NotFound(id))?;
            Ok(AppointmentView::from(&appointment))
        })
        .await
    }

    /// All appointments ordered by `(start, id)`.
    pub async fn list_appointments(
        &self,
        page: PageRequest,
    ) -> Result<Page<AppointmentView>, EngineError> {
        debug!(?page, "request to list appointments");
        self.observed("list_appointments", async move {
            let page = self.appointments.find_all(clamp_page(page)).await?;
            Ok(page.map(|a| AppointmentView::from(&a)))
        })
        .await
    }

    /// Appointments of an organization, or of one of its employees, that
    /// intersect `[start, end)`.
    pub async fn list_appointments_for(
        &self,
        organization_id: OrganizationId,
        employee_id: Option<EmployeeId>,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<AppointmentView>, EngineError> {
        debug!(
            organization_id,
            ?employee_id,
            %start,
            %end,
            "request to list appointments in range"
        );
        self.observed("list_appointments_for", async move {
            let window =
                Span::checked(start, end).ok_or(EngineError::empty_interval(start, end))?;
            if window.duration() > TimeDelta::days(MAX_QUERY_RANGE_DAYS) {
                return Err(EngineError::LimitExceeded("query range too wide"));
            }
            let hits = self
                .appointments
                .find_by_organization_and_window(organization_id, employee_id, window)
                .await?;
            Ok(hits.iter().map(AppointmentView::from).collect())
        })
        .await
    }
}
