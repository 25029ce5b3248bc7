use tracing::debug;
use ulid::Ulid;

use crate::model::*;
use crate::observability::AVAILABILITY_CHECKS_TOTAL;

use super::conflict::{find_conflict, validate_window};
use super::{Engine, EngineError};

/// Outcome of a property-wide availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Verdict {
    Available,
    Taken,
    Inactive,
    /// The property has no room categories.
    Empty,
}

impl Verdict {
    pub(super) fn label(self) -> &'static str {
        match self {
            Verdict::Available => "available",
            Verdict::Taken => "taken",
            Verdict::Inactive => "inactive",
            Verdict::Empty => "empty",
        }
    }
}

fn record(result: &'static str) {
    metrics::counter!(AVAILABILITY_CHECKS_TOTAL, "result" => result).increment(1);
}

impl Engine {
    /// Whether `[start, end)` is free in a room category.
    ///
    /// Only non-cancelled bookings block. `exclude` skips one booking, for
    /// re-checking a window that booking already occupies. An inactive
    /// property is never available.
    pub async fn check_availability(
        &self,
        room_category_id: Ulid,
        start: Timestamp,
        end: Timestamp,
        exclude: Option<Ulid>,
    ) -> Result<bool, EngineError> {
        let span = validate_window(&start, &end)?;
        let room = self.resolve_room(&room_category_id)?;
        let guard = room.read().await;
        let property_id = guard.category.property_id;
        let property = self
            .store
            .get_property(&property_id)
            .ok_or_else(|| EngineError::property(property_id))?;
        if !property.is_active {
            record("inactive");
            return Ok(false);
        }
        match find_conflict(&guard, &span, exclude) {
            Some(existing) => {
                debug!("{room_category_id} taken for [{start}, {end}) by {existing}");
                record("taken");
                Ok(false)
            }
            None => {
                record("available");
                Ok(true)
            }
        }
    }

    /// Property-wide check: true only when the property is active, has at
    /// least one room category, and none of them is booked in the window.
    pub async fn is_property_available(
        &self,
        property_id: Ulid,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<bool, EngineError> {
        let verdict = self.property_verdict(property_id, start, end).await?;
        record(verdict.label());
        Ok(verdict == Verdict::Available)
    }

    pub(super) async fn property_verdict(
        &self,
        property_id: Ulid,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Verdict, EngineError> {
        let span = validate_window(&start, &end)?;
        let property = self
            .store
            .get_property(&property_id)
            .ok_or_else(|| EngineError::property(property_id))?;
        if !property.is_active {
            return Ok(Verdict::Inactive);
        }
        let room_ids = self.store.rooms_of(&property_id);
        if room_ids.is_empty() {
            return Ok(Verdict::Empty);
        }
        for room_id in room_ids {
            let Some(room) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = room.read().await;
            if find_conflict(&guard, &span, None).is_some() {
                return Ok(Verdict::Taken);
            }
        }
        Ok(Verdict::Available)
    }

    /// Room categories of an active property that are free in the window.
    pub async fn available_room_categories(
        &self,
        property_id: Ulid,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<RoomCategory>, EngineError> {
        let span = validate_window(&start, &end)?;
        let property = self
            .store
            .get_property(&property_id)
            .ok_or_else(|| EngineError::property(property_id))?;
        if !property.is_active {
            return Ok(Vec::new());
        }
        let mut free = Vec::new();
        for room_id in self.store.rooms_of(&property_id) {
            let Some(room) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = room.read().await;
            if find_conflict(&guard, &span, None).is_none() {
                free.push(guard.category.clone());
            }
        }
        Ok(free)
    }
}
