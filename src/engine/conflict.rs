use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Validate a requested window and turn it into a span.
pub(crate) fn validate_window(start: &Timestamp, end: &Timestamp) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidRange);
    }
    let span = Span::from_timestamps(start, end);
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(span)
}

/// First non-cancelled booking overlapping `span`, skipping `exclude`.
pub fn find_conflict(rs: &RoomState, span: &Span, exclude: Option<Ulid>) -> Option<Ulid> {
    rs.overlapping(span)
        .filter(|b| b.status.occupies_slot())
        .find(|b| Some(b.id) != exclude)
        .map(|b| b.id)
}

pub(crate) fn check_no_conflict(rs: &RoomState, span: &Span) -> Result<(), EngineError> {
    match find_conflict(rs, span, None) {
        Some(existing) => Err(EngineError::SlotConflict(existing)),
        None => Ok(()),
    }
}
