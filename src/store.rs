use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::{Generator, Ulid};

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    /// Exclusion constraint on `(calendar, interval)` rejected the write.
    Overlap {
        calendar: CalendarKey,
        span: Span,
        existing: Ulid,
    },
    Io(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::Overlap {
                calendar,
                span,
                existing,
            } => write!(
                f,
                "[{}, {}) on {calendar} overlaps stored appointment {existing}",
                span.start, span.end
            ),
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Persistence port for appointments.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_by_id(&self, id: Ulid) -> Result<Option<Appointment>, StoreError>;

    /// Persist a new appointment and assign its id.
    async fn insert(&self, candidate: NewAppointment) -> Result<Appointment, StoreError>;

    /// Replace an existing appointment. `NotFound` if the id is unknown.
    async fn replace(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Returns whether a row was removed. Absence is not an error.
    async fn delete_by_id(&self, id: Ulid) -> Result<bool, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_all(&self) -> Result<usize, StoreError>;

    /// Ordered by `(start, id)`.
    async fn find_all(&self, page: PageRequest) -> Result<Page<Appointment>, StoreError>;

    /// Appointments on `calendar` intersecting `window`, ascending by start.
    async fn find_by_calendar_and_window(
        &self,
        calendar: CalendarKey,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Appointments of an organization (optionally one employee) intersecting
    /// `window`, ordered by `(start, id)`.
    async fn find_by_organization_and_window(
        &self,
        organization_id: OrganizationId,
        employee_id: Option<EmployeeId>,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError>;
}

/// Persistence port for the service catalog.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn find_service(&self, id: Ulid) -> Result<Option<Service>, StoreError>;
    async fn insert_service(&self, candidate: NewService) -> Result<Service, StoreError>;
    async fn replace_service(&self, service: Service) -> Result<Service, StoreError>;
    async fn delete_service(&self, id: Ulid) -> Result<bool, StoreError>;
    /// Ordered by id (creation order).
    async fn find_all_services(&self, page: PageRequest) -> Result<Page<Service>, StoreError>;
    async fn find_services_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Service>, StoreError>;
}

// ── In-memory implementation ─────────────────────────────────────

pub type SharedCalendar = Arc<RwLock<CalendarState>>;

/// All appointments on one calendar, sorted by `span.start`.
#[derive(Debug, Clone, Default)]
pub struct CalendarState {
    pub appointments: Vec<Appointment>,
}

impl CalendarState {
    /// Insert maintaining sort order by span.start.
    pub fn insert(&mut self, appointment: Appointment) {
        let pos = self
            .appointments
            .partition_point(|a| a.span.start <= appointment.span.start);
        self.appointments.insert(pos, appointment);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(pos))
    }

    /// Appointments whose span intersects `window`.
    /// Binary search skips everything starting at or after `window.end`.
    pub fn overlapping(&self, window: &Span) -> impl Iterator<Item = &Appointment> {
        let right_bound = self
            .appointments
            .partition_point(|a| a.span.start < window.end);
        self.appointments[..right_bound]
            .iter()
            .filter(move |a| a.span.end > window.start)
    }

    /// First stored appointment overlapping `span`, ignoring `exclude`.
    pub fn first_overlap(&self, span: &Span, exclude: Option<Ulid>) -> Option<Ulid> {
        self.overlapping(span)
            .find(|a| Some(a.id) != exclude)
            .map(|a| a.id)
    }
}

/// DashMap-backed store. Appointments are grouped per calendar behind a
/// tokio `RwLock`, so the exclusion check and the write happen under the
/// same lock.
pub struct InMemoryStore {
    calendars: DashMap<CalendarKey, SharedCalendar>,
    /// Reverse lookup: appointment id → calendar.
    index: DashMap<Ulid, CalendarKey>,
    services: DashMap<Ulid, Service>,
    ids: Mutex<Generator>,
    exclusive: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Store with the overlap exclusion constraint enabled.
    pub fn new() -> Self {
        Self::with_exclusion(true)
    }

    pub fn with_exclusion(exclusive: bool) -> Self {
        Self {
            calendars: DashMap::new(),
            index: DashMap::new(),
            services: DashMap::new(),
            ids: Mutex::new(Generator::new()),
            exclusive,
        }
    }

    pub fn appointment_count(&self) -> usize {
        self.index.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn calendar_of(&self, id: &Ulid) -> Option<CalendarKey> {
        self.index.get(id).map(|e| *e.value())
    }

    /// Monotonic within this store, so id order is creation order.
    pub(crate) fn next_id(&self) -> Ulid {
        match self.ids.lock() {
            Ok(mut ids) => ids.generate().unwrap_or_else(|_| Ulid::new()),
            Err(_) => Ulid::new(),
        }
    }

    fn calendar(&self, key: CalendarKey) -> SharedCalendar {
        self.calendars
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(CalendarState::default())))
            .clone()
    }

    fn existing_calendar(&self, key: &CalendarKey) -> Option<SharedCalendar> {
        self.calendars.get(key).map(|e| e.value().clone())
    }

    /// Fails with `Overlap` if the exclusion constraint would reject `span`.
    pub(crate) async fn check_exclusion(
        &self,
        calendar: CalendarKey,
        span: &Span,
        exclude: Option<Ulid>,
    ) -> Result<(), StoreError> {
        if !self.exclusive {
            return Ok(());
        }
        let Some(cal) = self.existing_calendar(&calendar) else {
            return Ok(());
        };
        let guard = cal.read().await;
        match guard.first_overlap(span, exclude) {
            Some(existing) => Err(StoreError::Overlap {
                calendar,
                span: *span,
                existing,
            }),
            None => Ok(()),
        }
    }

    /// Apply a record without any constraint check. The caller has already
    /// validated it (WAL replay, or a writer holding the WAL lock).
    pub(crate) async fn apply(&self, record: &StoreRecord) {
        match record {
            StoreRecord::AppointmentSaved(a) => {
                if let Some(old_key) = self.calendar_of(&a.id)
                    && let Some(old) = self.existing_calendar(&old_key)
                {
                    old.write().await.remove(a.id);
                }
                let cal = self.calendar(a.calendar);
                cal.write().await.insert(a.clone());
                self.index.insert(a.id, a.calendar);
            }
            StoreRecord::AppointmentRemoved { id } => {
                if let Some((_, key)) = self.index.remove(id)
                    && let Some(cal) = self.existing_calendar(&key)
                {
                    cal.write().await.remove(*id);
                }
            }
            StoreRecord::AppointmentsCleared => {
                self.clear_appointments().await;
            }
            StoreRecord::ServiceSaved(s) => {
                self.services.insert(s.id, s.clone());
            }
            StoreRecord::ServiceRemoved { id } => {
                self.services.remove(id);
            }
        }
    }

    /// Empty every calendar in place, each under its own write lock, so a
    /// writer that already holds a calendar either lands before the clear
    /// or after it. Returns the number of appointments removed.
    async fn clear_appointments(&self) -> usize {
        let cals: Vec<SharedCalendar> = self.calendars.iter().map(|e| e.value().clone()).collect();
        let mut removed = 0;
        for cal in cals {
            let mut guard = cal.write().await;
            for a in guard.appointments.drain(..) {
                self.index.remove(&a.id);
                removed += 1;
            }
        }
        removed
    }

    /// Minimal set of records that recreates the current state.
    pub(crate) async fn snapshot(&self) -> Vec<StoreRecord> {
        let mut records: Vec<StoreRecord> = Vec::new();
        let mut services: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        services.sort_by_key(|s| s.id);
        records.extend(services.into_iter().map(StoreRecord::ServiceSaved));
        for a in self.all_sorted().await {
            records.push(StoreRecord::AppointmentSaved(a));
        }
        records
    }

    async fn all_sorted(&self) -> Vec<Appointment> {
        let cals: Vec<SharedCalendar> = self.calendars.iter().map(|e| e.value().clone()).collect();
        let mut all = Vec::with_capacity(self.index.len());
        for cal in cals {
            all.extend(cal.read().await.appointments.iter().cloned());
        }
        all.sort_by_key(|a| (a.span.start, a.id));
        all
    }

    /// Lock two calendars in key order, remove from `from`, insert into `to`.
    async fn move_between(
        &self,
        from: CalendarKey,
        appointment: Appointment,
    ) -> Result<(), StoreError> {
        let to = appointment.calendar;
        let from_cal = self
            .existing_calendar(&from)
            .ok_or(StoreError::NotFound(appointment.id))?;
        let to_cal = self.calendar(to);
        let (mut from_guard, mut to_guard) = if from < to {
            let f = from_cal.write().await;
            let t = to_cal.write().await;
            (f, t)
        } else {
            let t = to_cal.write().await;
            let f = from_cal.write().await;
            (f, t)
        };
        if self.exclusive
            && let Some(existing) = to_guard.first_overlap(&appointment.span, Some(appointment.id))
        {
            return Err(StoreError::Overlap {
                calendar: to,
                span: appointment.span,
                existing,
            });
        }
        from_guard.remove(appointment.id);
        self.index.insert(appointment.id, to);
        to_guard.insert(appointment);
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn find_by_id(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        let Some(key) = self.calendar_of(&id) else {
            return Ok(None);
        };
        let Some(cal) = self.existing_calendar(&key) else {
            return Ok(None);
        };
        let guard = cal.read().await;
        Ok(guard.appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn insert(&self, candidate: NewAppointment) -> Result<Appointment, StoreError> {
        let cal = self.calendar(candidate.calendar);
        let mut guard = cal.write().await;
        if self.exclusive
            && let Some(existing) = guard.first_overlap(&candidate.span, None)
        {
            return Err(StoreError::Overlap {
                calendar: candidate.calendar,
                span: candidate.span,
                existing,
            });
        }
        let appointment = candidate.with_id(self.next_id());
        self.index.insert(appointment.id, appointment.calendar);
        guard.insert(appointment.clone());
        Ok(appointment)
    }

    async fn replace(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let current = self
            .calendar_of(&appointment.id)
            .ok_or(StoreError::NotFound(appointment.id))?;
        if current != appointment.calendar {
            self.move_between(current, appointment.clone()).await?;
            return Ok(appointment);
        }
        let cal = self
            .existing_calendar(&current)
            .ok_or(StoreError::NotFound(appointment.id))?;
        let mut guard = cal.write().await;
        if self.exclusive
            && let Some(existing) = guard.first_overlap(&appointment.span, Some(appointment.id))
        {
            return Err(StoreError::Overlap {
                calendar: current,
                span: appointment.span,
                existing,
            });
        }
        guard
            .remove(appointment.id)
            .ok_or(StoreError::NotFound(appointment.id))?;
        guard.insert(appointment.clone());
        Ok(appointment)
    }

    async fn delete_by_id(&self, id: Ulid) -> Result<bool, StoreError> {
        let Some((_, key)) = self.index.remove(&id) else {
            return Ok(false);
        };
        let Some(cal) = self.existing_calendar(&key) else {
            return Ok(false);
        };
        Ok(cal.write().await.remove(id).is_some())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        Ok(self.clear_appointments().await)
    }

    async fn find_all(&self, page: PageRequest) -> Result<Page<Appointment>, StoreError> {
        Ok(Page::from_sorted(self.all_sorted().await, page))
    }

    async fn find_by_calendar_and_window(
        &self,
        calendar: CalendarKey,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        let Some(cal) = self.existing_calendar(&calendar) else {
            return Ok(Vec::new());
        };
        let guard = cal.read().await;
        Ok(guard.overlapping(&window).cloned().collect())
    }

    async fn find_by_organization_and_window(
        &self,
        organization_id: OrganizationId,
        employee_id: Option<EmployeeId>,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        let cals: Vec<SharedCalendar> = self
            .calendars
            .iter()
            .filter(|e| {
                let key = e.key();
                key.organization_id == organization_id
                    && employee_id.is_none_or(|emp| key.employee_id == emp)
            })
            .map(|e| e.value().clone())
            .collect();
        let mut hits = Vec::new();
        for cal in cals {
            let guard = cal.read().await;
            hits.extend(guard.overlapping(&window).cloned());
        }
        hits.sort_by_key(|a| (a.span.start, a.id));
        Ok(hits)
    }
}

#[async_trait]
impl ServiceStore for InMemoryStore {
    async fn find_service(&self, id: Ulid) -> Result<Option<Service>, StoreError> {
        Ok(self.services.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_service(&self, candidate: NewService) -> Result<Service, StoreError> {
        let service = candidate.with_id(self.next_id());
        self.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn replace_service(&self, service: Service) -> Result<Service, StoreError> {
        let mut slot = self
            .services
            .get_mut(&service.id)
            .ok_or(StoreError::NotFound(service.id))?;
        *slot = service.clone();
        Ok(service)
    }

    async fn delete_service(&self, id: Ulid) -> Result<bool, StoreError> {
        Ok(self.services.remove(&id).is_some())
    }

    async fn find_all_services(&self, page: PageRequest) -> Result<Page<Service>, StoreError> {
        let mut all: Vec<Service> = self.services.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.id);
        Ok(Page::from_sorted(all, page))
    }

    async fn find_services_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Service>, StoreError> {
        let mut hits: Vec<Service> = self
            .services
            .iter()
            .filter(|e| e.value().organization_id == organization_id)
            .map(|e| e.value().clone())
            .collect();
        hits.sort_by_key(|s| s.id);
        Ok(hits)
    }
}
