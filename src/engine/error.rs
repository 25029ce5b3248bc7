use ulid::Ulid;

use crate::classifier::ClassifyError;
use crate::journal::JournalError;
use crate::model::{BookingStatus, StayType};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Ulid },
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("start must be before end")]
    InvalidRange,
    #[error("start time must be in the future")]
    PastStartTime,
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    #[error("duration mismatch: requested {requested} but duration corresponds to {derived}")]
    DurationMismatch { requested: StayType, derived: StayType },
    #[error("property {0} is not accepting bookings")]
    PropertyUnavailable(Ulid),
    #[error("{guests} guests exceed room capacity of {max}")]
    GuestCapacityExceeded { guests: u32, max: u32 },
    #[error("slot conflicts with booking {0}")]
    SlotConflict(Ulid),
    #[error("pricing failed: {0}")]
    PricingFailed(String),
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("{0} still has pending or confirmed bookings")]
    HasActiveBookings(Ulid),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error(transparent)]
    Journal(#[from] JournalError),
}

impl EngineError {
    pub(crate) fn room_category(id: Ulid) -> Self {
        EngineError::NotFound { entity: "room category", id }
    }

    pub(crate) fn property(id: Ulid) -> Self {
        EngineError::NotFound { entity: "property", id }
    }

    pub(crate) fn booking(id: Ulid) -> Self {
        EngineError::NotFound { entity: "booking", id }
    }

    /// Short stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::InvalidRange => "invalid_range",
            EngineError::PastStartTime => "past_start_time",
            EngineError::InvalidDuration(_) => "invalid_duration",
            EngineError::DurationMismatch { .. } => "duration_mismatch",
            EngineError::PropertyUnavailable(_) => "property_unavailable",
            EngineError::GuestCapacityExceeded { .. } => "guest_capacity_exceeded",
            EngineError::SlotConflict(_) => "slot_conflict",
            EngineError::PricingFailed(_) => "pricing_failed",
            EngineError::InvalidStatus(_) => "invalid_status",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::HasActiveBookings(_) => "has_active_bookings",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Journal(_) => "journal",
        }
    }

    /// Whether the caller sent something the engine refuses, as opposed to an
    /// internal storage fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::Journal(_))
    }
}

impl From<ClassifyError> for EngineError {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::InvalidDuration(msg) => EngineError::InvalidDuration(msg),
            ClassifyError::DurationMismatch { requested, derived } => {
                EngineError::DurationMismatch { requested, derived }
            }
        }
    }
}
