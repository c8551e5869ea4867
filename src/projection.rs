//! Field-by-field projections from stored entities to what callers and
//! event consumers see. Event payloads are deliberately narrower than the
//! entity: no nested customer or service.

use ulid::Ulid;

use crate::model::*;

impl From<&Appointment> for AppointmentView {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            start_at: a.span.start,
            end_at: a.span.end,
            organization_id: a.calendar.organization_id,
            employee_id: a.calendar.employee_id,
            customer: a.customer.clone(),
            service: a.service.clone(),
        }
    }
}

impl From<&Appointment> for AppointmentPayload {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            start_at: Some(a.span.start),
            end_at: Some(a.span.end),
            organization_id: Some(a.calendar.organization_id),
            employee_id: Some(a.calendar.employee_id),
        }
    }
}

impl AppointmentPayload {
    /// Payload for an appointment that is gone, or never existed.
    pub fn tombstone(id: Ulid) -> Self {
        Self {
            id,
            start_at: None,
            end_at: None,
            organization_id: None,
            employee_id: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.start_at.is_none()
            && self.end_at.is_none()
            && self.organization_id.is_none()
            && self.employee_id.is_none()
    }
}

impl From<&Service> for ServicePayload {
    fn from(s: &Service) -> Self {
        Self {
            id: s.id,
            name: Some(s.name.clone()),
            description: Some(s.description.clone()),
            duration: Some(s.duration),
            cost: Some(s.cost),
            organization_id: Some(s.organization_id),
        }
    }
}

impl ServicePayload {
    pub fn tombstone(id: Ulid) -> Self {
        Self {
            id,
            name: None,
            description: None,
            duration: None,
            cost: None,
            organization_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Appointment {
        let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        Appointment {
            id: Ulid::new(),
            calendar: CalendarKey::new(7, 11),
            span: Span::new(
                day.and_hms_opt(14, 0, 0).unwrap(),
                day.and_hms_opt(15, 0, 0).unwrap(),
            ),
            customer: Some(Customer {
                id: 99,
                last_name: "Roe".into(),
                first_name: "Sam".into(),
                mail: Some("sam@example.org".into()),
                phone: None,
                birthday: None,
                organization_id: 7,
            }),
            service: Some(Service {
                id: Ulid::new(),
                name: "Haircut".into(),
                description: "Wash and cut".into(),
                duration: 60,
                cost: 35.0,
                organization_id: 7,
            }),
        }
    }

    #[test]
    fn view_keeps_nested_references() {
        let a = sample();
        let view = AppointmentView::from(&a);
        assert_eq!(view.id, a.id);
        assert_eq!(view.start_at, a.span.start);
        assert_eq!(view.end_at, a.span.end);
        assert_eq!(view.organization_id, 7);
        assert_eq!(view.employee_id, 11);
        assert_eq!(view.customer, a.customer);
        assert_eq!(view.service, a.service);
    }

    #[test]
    fn payload_drops_nested_references() {
        let a = sample();
        let payload = AppointmentPayload::from(&a);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("customer").is_none());
        assert!(json.get("service").is_none());
        assert_eq!(json["organizationId"], 7);
        assert_eq!(json["employeeId"], 11);
        assert!(!payload.is_tombstone());
    }

    #[test]
    fn tombstone_carries_only_id() {
        let id = Ulid::new();
        let t = AppointmentPayload::tombstone(id);
        assert_eq!(t.id, id);
        assert!(t.is_tombstone());

        let s = ServicePayload::tombstone(id);
        assert_eq!(s.id, id);
        assert!(s.name.is_none() && s.cost.is_none() && s.organization_id.is_none());
    }

    #[test]
    fn service_payload_copies_all_fields() {
        let svc = sample().service.unwrap();
        let p = ServicePayload::from(&svc);
        assert_eq!(p.name.as_deref(), Some("Haircut"));
        assert_eq!(p.duration, Some(60));
        assert_eq!(p.cost, Some(35.0));
        assert_eq!(p.organization_id, Some(7));
    }
}
