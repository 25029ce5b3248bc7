use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub fn get_property(&self, id: Ulid) -> Result<Property, EngineError> {
        self.store
            .get_property(&id)
            .ok_or_else(|| EngineError::property(id))
    }

    /// All properties, ordered by id (creation order for ULIDs).
    pub fn list_properties(&self) -> Vec<Property> {
        self.store.properties()
    }

    pub async fn get_room_category(&self, id: Ulid) -> Result<RoomCategory, EngineError> {
        let room = self.resolve_room(&id)?;
        let guard = room.read().await;
        Ok(guard.category.clone())
    }

    pub async fn list_room_categories(&self, property_id: Ulid) -> Result<Vec<RoomCategory>, EngineError> {
        if !self.store.contains_property(&property_id) {
            return Err(EngineError::property(property_id));
        }
        let mut categories = Vec::new();
        for room_id in self.store.rooms_of(&property_id) {
            if let Some(room) = self.store.get_room(&room_id) {
                categories.push(room.read().await.category.clone());
            }
        }
        Ok(categories)
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let room_id = self
            .store
            .room_for_booking(&id)
            .ok_or_else(|| EngineError::booking(id))?;
        let room = self.resolve_room(&room_id)?;
        let guard = room.read().await;
        guard
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| EngineError::booking(id))
    }

    /// Every booking on a room category, cancelled ones included, by start.
    pub async fn list_bookings(&self, room_category_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        let room = self.resolve_room(&room_category_id)?;
        let guard = room.read().await;
        Ok(guard.bookings.clone())
    }

    /// A customer's bookings across all properties, by start.
    pub async fn list_bookings_for_user(&self, user_id: &str) -> Vec<Booking> {
        let mut found = Vec::new();
        for room_id in self.store.room_ids() {
            let Some(room) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = room.read().await;
            found.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.user_id.as_deref() == Some(user_id))
                    .cloned(),
            );
        }
        found.sort_by_key(|b| (b.start_at.timestamp_millis(), b.id));
        found
    }

    /// Parse a caller-supplied timestamp; offset-less values take the
    /// configured default offset.
    pub fn parse_timestamp(&self, text: &str) -> Result<Timestamp, EngineError> {
        parse_timestamp(text, self.config.default_offset).map_err(EngineError::InvalidInput)
    }
}
