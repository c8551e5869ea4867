use chrono::{Datelike, TimeDelta};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::error::{EngineError, ValidationError};

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

/// `start < end`, both inside the supported years, no longer than the cap.
pub(crate) fn validate_span(start: Timestamp, end: Timestamp) -> Result<Span, EngineError> {
    let span = Span::checked(start, end).ok_or(EngineError::empty_interval(start, end))?;
    let years = MIN_VALID_YEAR..=MAX_VALID_YEAR;
    if !years.contains(&start.year()) || !years.contains(&end.year()) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration() > TimeDelta::days(MAX_SPAN_DURATION_DAYS) {
        return Err(EngineError::LimitExceeded("appointment too long"));
    }
    Ok(span)
}

/// The id carried in an update body must be present and equal the target id.
pub(crate) fn check_body_id(path: Ulid, body: Option<Ulid>) -> Result<(), ValidationError> {
    let body = body.ok_or(ValidationError::IdMissing)?;
    if body != path {
        return Err(ValidationError::IdMismatch { path, body });
    }
    Ok(())
}

/// A patch may omit the id, but if present it must match.
pub(crate) fn check_patch_id(path: Ulid, body: Option<Ulid>) -> Result<(), ValidationError> {
    match body {
        Some(body) if body != path => Err(ValidationError::IdMismatch { path, body }),
        _ => Ok(()),
    }
}

/// Required fields and interval of a create/update body. Ignores `input.id`.
pub(crate) fn build_candidate(input: AppointmentInput) -> Result<NewAppointment, EngineError> {
    let start = required(input.start_at, "startAt")?;
    let end = required(input.end_at, "endAt")?;
    let organization_id = required(input.organization_id, "organizationId")?;
    let employee_id = required(input.employee_id, "employeeId")?;
    let span = validate_span(start, end)?;
    Ok(NewAppointment {
        calendar: CalendarKey::new(organization_id, employee_id),
        span,
        customer: input.customer,
        service: input.service,
    })
}

/// Overlay the present fields of `patch` onto `current`, then re-validate the interval.
pub(crate) fn merge_patch(
    current: &Appointment,
    patch: AppointmentPatch,
) -> Result<Appointment, EngineError> {
    let start = patch.start_at.unwrap_or(current.span.start);
    let end = patch.end_at.unwrap_or(current.span.end);
    let span = if patch.start_at.is_some() || patch.end_at.is_some() {
        validate_span(start, end)?
    } else {
        current.span
    };
    Ok(Appointment {
        id: current.id,
        calendar: CalendarKey::new(
            patch
                .organization_id
                .unwrap_or(current.calendar.organization_id),
            patch.employee_id.unwrap_or(current.calendar.employee_id),
        ),
        span,
        customer: patch.customer.or_else(|| current.customer.clone()),
        service: patch.service.or_else(|| current.service.clone()),
    })
}

fn check_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "name",
            reason: "must not be blank",
        }
        .into());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("service name too long"));
    }
    Ok(())
}

fn check_service_values(service: &NewService) -> Result<(), EngineError> {
    check_name(&service.name)?;
    if service.description.len() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::LimitExceeded("service description too long"));
    }
    if service.duration == 0 {
        return Err(ValidationError::InvalidField {
            field: "duration",
            reason: "must be positive",
        }
        .into());
    }
    if !service.cost.is_finite() || service.cost < 0.0 {
        return Err(ValidationError::InvalidField {
            field: "cost",
            reason: "must be a non-negative number",
        }
        .into());
    }
    Ok(())
}

pub(crate) fn build_service(input: ServiceInput) -> Result<NewService, EngineError> {
    let service = NewService {
        name: required(input.name, "name")?,
        description: required(input.description, "description")?,
        duration: required(input.duration, "duration")?,
        cost: required(input.cost, "cost")?,
        organization_id: required(input.organization_id, "organizationId")?,
    };
    check_service_values(&service)?;
    Ok(service)
}

pub(crate) fn merge_service(current: &Service, patch: ServicePatch) -> Result<Service, EngineError> {
    let merged = NewService {
        name: patch.name.unwrap_or_else(|| current.name.clone()),
        description: patch
            .description
            .unwrap_or_else(|| current.description.clone()),
        duration: patch.duration.unwrap_or(current.duration),
        cost: patch.cost.unwrap_or(current.cost),
        organization_id: patch.organization_id.unwrap_or(current.organization_id),
    };
    check_service_values(&merged)?;
    Ok(merged.with_id(current.id))
}
