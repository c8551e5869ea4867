use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::*;
use crate::observability::{WAL_COMPACTIONS_TOTAL, WAL_FLUSH_DURATION_SECONDS};
use crate::store::{AppointmentStore, InMemoryStore, ServiceStore, StoreError};
use crate::wal::Wal;

/// In-memory store made durable by a write-ahead log.
///
/// Every mutation runs with the WAL mutex held: constraint check against
/// memory, append + fsync, then apply to memory. Reads go straight to memory.
pub struct WalStore {
    mem: InMemoryStore,
    wal: Mutex<Wal>,
}

impl WalStore {
    /// Replay the log at `path` into a fresh in-memory store, then open it for appends.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let (wal, records) = Wal::recover(path)?;
        let mem = InMemoryStore::new();
        for record in &records {
            mem.apply(record).await;
        }
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            appointments = mem.appointment_count(),
            services = mem.service_count(),
            "store replayed"
        );
        Ok(Self {
            mem,
            wal: Mutex::new(wal),
        })
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.wal.lock().await.appends_since_compact()
    }

    /// Rewrite the log as a snapshot of live rows. Writers wait meanwhile.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        let records = self.mem.snapshot().await;
        wal.compact(&records)?;
        metrics::counter!(WAL_COMPACTIONS_TOTAL).increment(1);
        tracing::info!(records = records.len(), "WAL compacted");
        Ok(())
    }

    /// Log then apply. Caller holds the WAL lock.
    async fn commit(&self, wal: &mut Wal, record: StoreRecord) -> Result<(), StoreError> {
        let started = Instant::now();
        wal.append(&record)?;
        metrics::histogram!(WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        self.mem.apply(&record).await;
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for WalStore {
    async fn find_by_id(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        self.mem.find_by_id(id).await
    }

    async fn insert(&self, candidate: NewAppointment) -> Result<Appointment, StoreError> {
        let mut wal = self.wal.lock().await;
        self.mem
            .check_exclusion(candidate.calendar, &candidate.span, None)
            .await?;
        let appointment = candidate.with_id(self.mem.next_id());
        self.commit(&mut wal, StoreRecord::AppointmentSaved(appointment.clone()))
            .await?;
        Ok(appointment)
    }

    async fn replace(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut wal = self.wal.lock().await;
        if self.mem.calendar_of(&appointment.id).is_none() {
            return Err(StoreError::NotFound(appointment.id));
        }
        self.mem
            .check_exclusion(appointment.calendar, &appointment.span, Some(appointment.id))
            .await?;
        self.commit(&mut wal, StoreRecord::AppointmentSaved(appointment.clone()))
            .await?;
        Ok(appointment)
    }

    async fn delete_by_id(&self, id: Ulid) -> Result<bool, StoreError> {
        let mut wal = self.wal.lock().await;
        if self.mem.calendar_of(&id).is_none() {
            return Ok(false);
        }
        self.commit(&mut wal, StoreRecord::AppointmentRemoved { id })
            .await?;
        Ok(true)
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let mut wal = self.wal.lock().await;
        let removed = self.mem.appointment_count();
        self.commit(&mut wal, StoreRecord::AppointmentsCleared).await?;
        Ok(removed)
    }

    async fn find_all(&self, page: PageRequest) -> Result<Page<Appointment>, StoreError> {
        self.mem.find_all(page).await
    }

    async fn find_by_calendar_and_window(
        &self,
        calendar: CalendarKey,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.mem.find_by_calendar_and_window(calendar, window).await
    }

    async fn find_by_organization_and_window(
        &self,
        organization_id: OrganizationId,
        employee_id: Option<EmployeeId>,
        window: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.mem
            .find_by_organization_and_window(organization_id, employee_id, window)
            .await
    }
}

#[async_trait]
impl ServiceStore for WalStore {
    async fn find_service(&self, id: Ulid) -> Result<Option<Service>, StoreError> {
        self.mem.find_service(id).await
    }

    async fn insert_service(&self, candidate: NewService) -> Result<Service, StoreError> {
        let mut wal = self.wal.lock().await;
        let service = candidate.with_id(self.mem.next_id());
        self.commit(&mut wal, StoreRecord::ServiceSaved(service.clone()))
            .await?;
        Ok(service)
    }

    async fn replace_service(&self, service: Service) -> Result<Service, StoreError> {
        let mut wal = self.wal.lock().await;
        if self.mem.find_service(service.id).await?.is_none() {
            return Err(StoreError::NotFound(service.id));
        }
        self.commit(&mut wal, StoreRecord::ServiceSaved(service.clone()))
            .await?;
        Ok(service)
    }

    async fn delete_service(&self, id: Ulid) -> Result<bool, StoreError> {
        let mut wal = self.wal.lock().await;
        if self.mem.find_service(id).await?.is_none() {
            return Ok(false);
        }
        self.commit(&mut wal, StoreRecord::ServiceRemoved { id }).await?;
        Ok(true)
    }

    async fn find_all_services(&self, page: PageRequest) -> Result<Page<Service>, StoreError> {
        self.mem.find_all_services(page).await
    }

    async fn find_services_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Service>, StoreError> {
        self.mem.find_services_by_organization(organization_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotbook_test_durable");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn slot(cal: CalendarKey, h: u32) -> NewAppointment {
        let day = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        NewAppointment {
            calendar: cal,
            span: Span::new(
                day.and_hms_opt(h, 0, 0).unwrap(),
                day.and_hms_opt(h + 1, 0, 0).unwrap(),
            ),
            customer: None,
            service: None,
        }
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let path = test_wal_path("reopen.wal");
        let cal = CalendarKey::new(1, 1);
        let (kept, moved) = {
            let store = WalStore::open(&path).await.unwrap();
            let kept = store.insert(slot(cal, 9)).await.unwrap();
            let gone = store.insert(slot(cal, 10)).await.unwrap();
            let moved = store.insert(slot(cal, 11)).await.unwrap();
            store.delete_by_id(gone.id).await.unwrap();
            let moved = store
                .replace(Appointment {
                    calendar: CalendarKey::new(1, 2),
                    ..moved
                })
                .await
                .unwrap();
            (kept, moved)
        };

        let reopened = WalStore::open(&path).await.unwrap();
        let all = reopened.find_all(PageRequest::default()).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(reopened.find_by_id(kept.id).await.unwrap(), Some(kept));
        assert_eq!(reopened.find_by_id(moved.id).await.unwrap(), Some(moved));
    }

    #[tokio::test]
    async fn rejected_write_is_not_logged() {
        let path = test_wal_path("rejected.wal");
        let cal = CalendarKey::new(2, 2);
        let store = WalStore::open(&path).await.unwrap();
        store.insert(slot(cal, 9)).await.unwrap();
        let err = store.insert(slot(cal, 9)).await.unwrap_err();
        assert!(matches!(err, StoreError::Overlap { .. }));
        assert_eq!(store.appends_since_compact().await, 1);
        assert_eq!(Wal::replay(&path).unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn writes_after_a_torn_tail_survive_the_next_reopen() {
        use std::io::Write;

        let path = test_wal_path("torn_tail.wal");
        let cal = CalendarKey::new(4, 4);
        let first = {
            let store = WalStore::open(&path).await.unwrap();
            store.insert(slot(cal, 9)).await.unwrap()
        };
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 6]).unwrap();
        }
        let second = {
            let store = WalStore::open(&path).await.unwrap();
            assert_eq!(store.find_by_id(first.id).await.unwrap(), Some(first.clone()));
            store.insert(slot(cal, 11)).await.unwrap()
        };

        let reopened = WalStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_by_id(first.id).await.unwrap(), Some(first));
        assert_eq!(reopened.find_by_id(second.id).await.unwrap(), Some(second.clone()));
        // the slot stays taken
        assert!(matches!(
            reopened.insert(slot(cal, 11)).await,
            Err(StoreError::Overlap { existing, .. }) if existing == second.id
        ));
    }

    #[tokio::test]
    async fn delete_missing_appends_nothing() {
        let path = test_wal_path("delete_missing.wal");
        let store = WalStore::open(&path).await.unwrap();
        assert!(!store.delete_by_id(Ulid::new()).await.unwrap());
        assert_eq!(store.appends_since_compact().await, 0);
    }

    #[tokio::test]
    async fn compaction_keeps_live_rows_only() {
        let path = test_wal_path("compaction.wal");
        let cal = CalendarKey::new(3, 3);
        let store = WalStore::open(&path).await.unwrap();
        for h in 8..16 {
            let a = store.insert(slot(cal, h)).await.unwrap();
            if h % 2 == 0 {
                store.delete_by_id(a.id).await.unwrap();
            }
        }
        store
            .insert_service(NewService {
                name: "Massage".into(),
                description: "Deep tissue".into(),
                duration: 45,
                cost: 70.0,
                organization_id: 3,
            })
            .await
            .unwrap();
        store.compact().await.unwrap();
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(Wal::replay(&path).unwrap().records.len(), 5);

        let reopened = WalStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_all(PageRequest::default()).await.unwrap().total, 4);
        assert_eq!(reopened.find_services_by_organization(3).await.unwrap().len(), 1);
    }
}
