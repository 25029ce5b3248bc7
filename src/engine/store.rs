use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::SharedRoomState;

/// In-memory record set: properties, room categories (each behind its own
/// lock, holding its bookings) and the reverse indexes between them.
pub struct InMemoryStore {
    properties: DashMap<Ulid, Property>,
    rooms: DashMap<Ulid, SharedRoomState>,
    /// booking id → room category id
    booking_to_room: DashMap<Ulid, Ulid>,
    /// property id → room category ids
    property_rooms: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            properties: DashMap::new(),
            rooms: DashMap::new(),
            booking_to_room: DashMap::new(),
            property_rooms: DashMap::new(),
        }
    }

    // ── Properties ───────────────────────────────────────────

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn contains_property(&self, id: &Ulid) -> bool {
        self.properties.contains_key(id)
    }

    pub fn get_property(&self, id: &Ulid) -> Option<Property> {
        self.properties.get(id).map(|e| e.value().clone())
    }

    pub fn properties(&self) -> Vec<Property> {
        let mut all: Vec<Property> = self.properties.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|p| p.id);
        all
    }

    // ── Room categories ──────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, id: &Ulid) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn rooms_of(&self, property_id: &Ulid) -> Vec<Ulid> {
        self.property_rooms
            .get(property_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn room_ids(&self) -> Vec<Ulid> {
        self.rooms.iter().map(|e| *e.key()).collect()
    }

    // ── Booking index ────────────────────────────────────────

    pub fn room_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_room.get(booking_id).map(|e| *e.value())
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_room.len()
    }

    // ── Event application ────────────────────────────────────

    /// Apply a catalog-level event: one that adds or removes map entries
    /// rather than mutating a single room's state.
    pub fn apply_catalog(&self, event: &Event) {
        match event {
            Event::PropertyCreated(p) | Event::PropertyUpdated(p) => {
                self.properties.insert(p.id, p.clone());
            }
            Event::PropertyDeleted { id } => {
                self.properties.remove(id);
                if let Some((_, room_ids)) = self.property_rooms.remove(id) {
                    for room_id in room_ids {
                        self.drop_room(&room_id);
                    }
                }
            }
            Event::RoomCategoryCreated(category) => {
                self.property_rooms
                    .entry(category.property_id)
                    .or_default()
                    .push(category.id);
                self.rooms.insert(
                    category.id,
                    Arc::new(RwLock::new(RoomState::new(category.clone()))),
                );
            }
            Event::RoomCategoryDeleted { id, property_id } => {
                if let Some(mut ids) = self.property_rooms.get_mut(property_id) {
                    ids.retain(|r| r != id);
                }
                self.drop_room(id);
            }
            // Room-scoped; routed through `apply_to_room` under the room's lock.
            Event::RoomCategoryUpdated(_)
            | Event::BookingCreated(_)
            | Event::BookingStatusChanged { .. } => {}
        }
    }

    /// Apply a room-scoped event. Caller holds the room's write lock.
    pub fn apply_to_room(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::RoomCategoryUpdated(category) => {
                rs.category = category.clone();
            }
            Event::BookingCreated(booking) => {
                self.booking_to_room
                    .insert(booking.id, booking.room_category_id);
                rs.insert_booking(booking.clone());
            }
            Event::BookingStatusChanged { id, status, .. } => {
                if let Some(b) = rs.booking_mut(*id) {
                    b.status = *status;
                }
            }
            _ => {}
        }
    }

    /// Remove a room and unindex its bookings. Caller may still hold the
    /// room's lock; the Arc outlives the map entry.
    fn drop_room(&self, room_id: &Ulid) {
        if self.rooms.remove(room_id).is_some() {
            self.booking_to_room.retain(|_, r| r != room_id);
        }
    }
}

/// Room id carried by a room-scoped event.
pub(super) fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::RoomCategoryUpdated(c) => Some(c.id),
        Event::BookingCreated(b) => Some(b.room_category_id),
        Event::BookingStatusChanged {
            room_category_id, ..
        } => Some(*room_category_id),
        Event::PropertyCreated(_)
        | Event::PropertyUpdated(_)
        | Event::PropertyDeleted { .. }
        | Event::RoomCategoryCreated(_)
        | Event::RoomCategoryDeleted { .. } => None,
    }
}
