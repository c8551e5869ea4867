use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Naive instant. Every input shares one time base; no zone conversion happens here.
pub type Timestamp = NaiveDateTime;

pub type OrganizationId = i64;
pub type EmployeeId = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Span {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn checked(start: Timestamp, end: Timestamp) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The scheduling resource: one employee's calendar inside one organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarKey {
    pub organization_id: OrganizationId,
    pub employee_id: EmployeeId,
}

impl CalendarKey {
    pub fn new(organization_id: OrganizationId, employee_id: EmployeeId) -> Self {
        Self {
            organization_id,
            employee_id,
        }
    }
}

impl std::fmt::Display for CalendarKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "organization {} / employee {}",
            self.organization_id, self.employee_id
        )
    }
}

/// Customer attached to an appointment. Owned by another subsystem; carried as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub mail: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub organization_id: OrganizationId,
}

/// A bookable service offered by an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub description: String,
    /// Minutes.
    pub duration: u32,
    pub cost: f64,
    pub organization_id: OrganizationId,
}

/// A service that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub duration: u32,
    pub cost: f64,
    pub organization_id: OrganizationId,
}

impl NewService {
    pub fn with_id(self, id: Ulid) -> Service {
        Service {
            id,
            name: self.name,
            description: self.description,
            duration: self.duration,
            cost: self.cost,
            organization_id: self.organization_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub calendar: CalendarKey,
    pub span: Span,
    pub customer: Option<Customer>,
    pub service: Option<Service>,
}

/// Candidate appointment: everything but the store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub calendar: CalendarKey,
    pub span: Span,
    pub customer: Option<Customer>,
    pub service: Option<Service>,
}

impl NewAppointment {
    pub fn with_id(self, id: Ulid) -> Appointment {
        Appointment {
            id,
            calendar: self.calendar,
            span: self.span,
            customer: self.customer,
            service: self.service,
        }
    }
}

// ── Caller-facing inputs ─────────────────────────────────────────

/// Body of a create or full update. Required fields are checked by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentInput {
    pub id: Option<Ulid>,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub organization_id: Option<OrganizationId>,
    pub employee_id: Option<EmployeeId>,
    pub customer: Option<Customer>,
    pub service: Option<Service>,
}

/// Partial update: only present fields are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    pub id: Option<Ulid>,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub organization_id: Option<OrganizationId>,
    pub employee_id: Option<EmployeeId>,
    pub customer: Option<Customer>,
    pub service: Option<Service>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInput {
    pub id: Option<Ulid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<u32>,
    pub cost: Option<f64>,
    pub organization_id: Option<OrganizationId>,
}

/// Same shape as [`ServiceInput`]; absent fields keep their stored value.
pub type ServicePatch = ServiceInput;

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    pub id: Ulid,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    pub organization_id: OrganizationId,
    pub employee_id: EmployeeId,
    pub customer: Option<Customer>,
    pub service: Option<Service>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 20 }
    }
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice an already ordered collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();
        Self {
            items,
            page: request.page,
            size: request.size,
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}

// ── Change notifications ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// One channel per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    AppointmentChanged,
    ServiceChanged,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::AppointmentChanged => "appointment.changed",
            Topic::ServiceChanged => "service.changed",
        }
    }
}

/// Event-facing projection of an appointment. Only `id` is guaranteed;
/// a tombstone carries nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPayload {
    pub id: Ulid,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub organization_id: Option<OrganizationId>,
    pub employee_id: Option<EmployeeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePayload {
    pub id: Ulid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<u32>,
    pub cost: Option<f64>,
    pub organization_id: Option<OrganizationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Appointment(AppointmentPayload),
    Service(ServicePayload),
}

impl Payload {
    pub fn topic(&self) -> Topic {
        match self {
            Payload::Appointment(_) => Topic::AppointmentChanged,
            Payload::Service(_) => Topic::ServiceChanged,
        }
    }

    pub fn id(&self) -> Ulid {
        match self {
            Payload::Appointment(p) => p.id,
            Payload::Service(p) => p.id,
        }
    }
}

impl From<AppointmentPayload> for Payload {
    fn from(p: AppointmentPayload) -> Self {
        Payload::Appointment(p)
    }
}

impl From<ServicePayload> for Payload {
    fn from(p: ServicePayload) -> Self {
        Payload::Service(p)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: Timestamp,
    pub kind: ChangeKind,
    pub payload: Payload,
}

// ── Durable log records ──────────────────────────────────────────

/// Store mutations as written to the WAL. Flat, replayed in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreRecord {
    AppointmentSaved(Appointment),
    AppointmentRemoved { id: Ulid },
    AppointmentsCleared,
    ServiceSaved(Service),
    ServiceRemoved { id: Ulid },
}
