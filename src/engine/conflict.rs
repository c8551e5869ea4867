//! Availability check: may a candidate interval be booked on a calendar,
//! given the appointments already there? Pure; no I/O and no clock.

use chrono::{NaiveTime, TimeDelta};
use ulid::Ulid;

use crate::model::*;

/// A candidate collided with an existing appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub calendar: CalendarKey,
    pub requested: Span,
    pub existing: Ulid,
}

/// The calendar day containing `reference`: `[midnight, midnight + 1 day)`.
///
/// The engine always passes the candidate's own start, never "now", so
/// bookings on any date are checked against that date.
pub fn conflict_window(reference: Timestamp) -> Span {
    let day_start = reference.date().and_time(NaiveTime::MIN);
    Span::new(day_start, day_start + TimeDelta::days(1))
}

/// The range the checker loads existing appointments from: the candidate's
/// start day, stretched to the candidate's end when it runs past midnight.
pub fn lookup_window(candidate: &Span) -> Span {
    let day = conflict_window(candidate.start);
    Span::new(day.start, day.end.max(candidate.end))
}

/// Half-open overlap. Touching at a boundary is not a conflict.
pub fn intervals_conflict(candidate: &Span, existing: &Span) -> bool {
    !(candidate.start >= existing.end || candidate.end <= existing.start)
}

/// Scan `existing` in order and return the first appointment on `calendar`
/// that overlaps `candidate`. `exclude` skips the appointment being edited.
pub fn check_availability(
    calendar: CalendarKey,
    candidate: &Span,
    existing: &[Appointment],
    exclude: Option<Ulid>,
) -> Result<(), Conflict> {
    let hit = existing.iter().find(|a| {
        a.calendar == calendar && Some(a.id) != exclude && intervals_conflict(candidate, &a.span)
    });
    match hit {
        Some(a) => Err(Conflict {
            calendar,
            requested: *candidate,
            existing: a.id,
        }),
        None => Ok(()),
    }
}
