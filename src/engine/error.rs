use ulid::Ulid;

use crate::model::{Span, Timestamp};
use crate::store::StoreError;
use crate::transport::TransportError;

use super::conflict::Conflict;

/// Input rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(&'static str),
    /// A new entity cannot already have an id.
    IdPresent,
    IdMissing,
    IdMismatch { path: Ulid, body: Ulid },
    /// `start_at` is not strictly before `end_at`.
    EmptyInterval { start: Timestamp, end: Timestamp },
    InvalidField { field: &'static str, reason: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "missing required field: {field}"),
            ValidationError::IdPresent => write!(f, "a new entity cannot already have an id"),
            ValidationError::IdMissing => write!(f, "id is required"),
            ValidationError::IdMismatch { path, body } => {
                write!(f, "id mismatch: path {path}, body {body}")
            }
            ValidationError::EmptyInterval { start, end } => {
                write!(f, "start {start} must be before end {end}")
            }
            ValidationError::InvalidField { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    NotFound(Ulid),
    /// The availability check found an overlapping appointment.
    ResourceConflict(Conflict),
    /// The store's exclusion constraint rejected the write (lost a race).
    ConstraintViolation(Conflict),
    LimitExceeded(&'static str),
    Store(String),
    Publish(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "validation failed: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::ResourceConflict(c) => write!(
                f,
                "slot [{}, {}) on {} is not available: conflicts with appointment {}",
                c.requested.start, c.requested.end, c.calendar, c.existing
            ),
            EngineError::ConstraintViolation(c) => write!(
                f,
                "slot [{}, {}) on {} was taken concurrently by appointment {}",
                c.requested.start, c.requested.end, c.calendar, c.existing
            ),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
            EngineError::Publish(e) => write!(f, "publish error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Overlap {
                calendar,
                span,
                existing,
            } => EngineError::ConstraintViolation(Conflict {
                calendar,
                requested: span,
                existing,
            }),
            StoreError::Io(msg) => EngineError::Store(msg),
        }
    }
}

impl From<TransportError> for EngineError {
    fn from(e: TransportError) -> Self {
        EngineError::Publish(e.0)
    }
}

impl EngineError {
    pub(crate) fn empty_interval(span_start: Timestamp, span_end: Timestamp) -> Self {
        EngineError::Validation(ValidationError::EmptyInterval {
            start: span_start,
            end: span_end,
        })
    }

    /// The requested span, for errors that carry one.
    pub fn requested_span(&self) -> Option<Span> {
        match self {
            EngineError::ResourceConflict(c) | EngineError::ConstraintViolation(c) => {
                Some(c.requested)
            }
            _ => None,
        }
    }
}
