use tracing::{debug, info};
use ulid::Ulid;

use crate::config::is_currency_code;
use crate::limits::*;
use crate::model::*;
use crate::observability::{BOOKINGS_CREATED_TOTAL, BOOKINGS_REJECTED_TOTAL, STATUS_TRANSITIONS_TOTAL};

use super::conflict::{check_no_conflict, validate_window};
use super::pricing::{parse_stay_type, quote};
use super::{Engine, EngineError};

fn check_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidInput("name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn check_optional(field: &Option<String>, max: usize, what: &'static str) -> Result<(), EngineError> {
    match field {
        Some(v) if v.len() > max => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}

fn check_room_category(category: &RoomCategory) -> Result<(), EngineError> {
    check_name(&category.name)?;
    if category.max_guests == 0 {
        return Err(EngineError::InvalidInput("max guests must be at least 1".into()));
    }
    if category.max_guests > MAX_GUESTS_PER_ROOM_CATEGORY {
        return Err(EngineError::LimitExceeded("max guests too large"));
    }
    if category.rates.has_negative() {
        return Err(EngineError::InvalidInput("prices must not be negative".into()));
    }
    Ok(())
}

impl Engine {
    // ── Properties ───────────────────────────────────────────

    pub async fn create_property(&self, id: Ulid, new: NewProperty) -> Result<Property, EngineError> {
        check_name(&new.name)?;
        check_optional(&new.location, MAX_LOCATION_LEN, "location too long")?;
        check_optional(&new.owner_id, MAX_CONTACT_LEN, "owner id too long")?;

        let _gate = self.gate().await;
        let _catalog = self.catalog_lock.lock().await;
        if self.store.property_count() >= MAX_PROPERTIES {
            return Err(EngineError::LimitExceeded("too many properties"));
        }
        if self.store.contains_property(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let property = Property {
            id,
            owner_id: new.owner_id,
            name: new.name,
            location: new.location,
            is_active: new.is_active,
        };
        self.commit_catalog(&Event::PropertyCreated(property.clone()))
            .await?;
        info!("property {id} created");
        Ok(property)
    }

    pub async fn update_property(&self, id: Ulid, patch: PropertyPatch) -> Result<Property, EngineError> {
        let _gate = self.gate().await;
        let _catalog = self.catalog_lock.lock().await;
        let mut property = self
            .store
            .get_property(&id)
            .ok_or_else(|| EngineError::property(id))?;
        if let Some(name) = patch.name {
            check_name(&name)?;
            property.name = name;
        }
        if let Some(location) = patch.location {
            if location.len() > MAX_LOCATION_LEN {
                return Err(EngineError::LimitExceeded("location too long"));
            }
            property.location = Some(location);
        }
        if let Some(active) = patch.is_active {
            property.is_active = active;
        }
        self.commit_catalog(&Event::PropertyUpdated(property.clone()))
            .await?;
        info!("property {id} updated (active: {})", property.is_active);
        Ok(property)
    }

    /// Delete a property and every room category under it. Refused while any
    /// of those categories holds a pending or confirmed booking.
    pub async fn delete_property(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.gate().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.store.contains_property(&id) {
            return Err(EngineError::property(id));
        }

        // Hold every room's write lock, in id order, so no booking slips in
        // between the check and the delete.
        let mut room_ids = self.store.rooms_of(&id);
        room_ids.sort();
        let mut guards = Vec::with_capacity(room_ids.len());
        for room_id in &room_ids {
            if let Some(room) = self.store.get_room(room_id) {
                guards.push(room.write_owned().await);
            }
        }
        if let Some(busy) = guards.iter().find(|g| g.has_active_bookings()) {
            return Err(EngineError::HasActiveBookings(busy.category.id));
        }

        self.commit_catalog(&Event::PropertyDeleted { id }).await?;
        info!("property {id} deleted with {} room categories", guards.len());
        Ok(())
    }

    // ── Room categories ──────────────────────────────────────

    pub async fn create_room_category(
        &self,
        id: Ulid,
        property_id: Ulid,
        new: NewRoomCategory,
    ) -> Result<RoomCategory, EngineError> {
        let category = RoomCategory {
            id,
            property_id,
            name: new.name,
            max_guests: new.max_guests,
            bedrooms: new.bedrooms,
            bathrooms: new.bathrooms,
            floor_area_sqft: new.floor_area_sqft,
            rates: new.rates,
        };
        check_room_category(&category)?;

        let _gate = self.gate().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.store.contains_property(&property_id) {
            return Err(EngineError::property(property_id));
        }
        if self.store.contains_room(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.store.rooms_of(&property_id).len() >= MAX_ROOM_CATEGORIES_PER_PROPERTY {
            return Err(EngineError::LimitExceeded("too many room categories on property"));
        }

        self.commit_catalog(&Event::RoomCategoryCreated(category.clone()))
            .await?;
        info!("room category {id} created on property {property_id}");
        Ok(category)
    }

    /// Patch a room category. Recorded booking totals are untouched by
    /// rate changes.
    pub async fn update_room_category(
        &self,
        id: Ulid,
        patch: RoomCategoryPatch,
    ) -> Result<RoomCategory, EngineError> {
        let _gate = self.gate().await;
        let room = self.resolve_room(&id)?;
        let mut guard = room.write().await;
        if !self.store.contains_room(&id) {
            return Err(EngineError::room_category(id));
        }

        let mut category = guard.category.clone();
        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(max_guests) = patch.max_guests {
            category.max_guests = max_guests;
        }
        if let Some(bedrooms) = patch.bedrooms {
            category.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = patch.bathrooms {
            category.bathrooms = bathrooms;
        }
        if let Some(area) = patch.floor_area_sqft {
            category.floor_area_sqft = Some(area);
        }
        let rates = &mut category.rates;
        rates.price_4h = patch.price_4h.unwrap_or(rates.price_4h);
        rates.price_6h = patch.price_6h.unwrap_or(rates.price_6h);
        rates.price_12h = patch.price_12h.unwrap_or(rates.price_12h);
        rates.price_24h = patch.price_24h.unwrap_or(rates.price_24h);
        check_room_category(&category)?;

        self.commit_room(&mut guard, &Event::RoomCategoryUpdated(category.clone()))
            .await?;
        info!("room category {id} updated");
        Ok(category)
    }

    /// Delete a room category along with its booking history. Refused while
    /// it holds a pending or confirmed booking.
    pub async fn delete_room_category(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.gate().await;
        let _catalog = self.catalog_lock.lock().await;
        let room = self.resolve_room(&id)?;
        let guard = room.write().await;
        if guard.has_active_bookings() {
            return Err(EngineError::HasActiveBookings(id));
        }
        let event = Event::RoomCategoryDeleted {
            id,
            property_id: guard.category.property_id,
        };
        self.commit_catalog(&event).await?;
        info!("room category {id} deleted");
        Ok(())
    }

    // ── Bookings ─────────────────────────────────────────────

    /// The booking transaction: validate, check the slot, price, persist.
    ///
    /// Every check runs before anything is written, and the slot check and the
    /// write happen under the room category's write lock. The stored total is
    /// always the server-computed price.
    pub async fn create_booking(&self, input: BookingInput) -> Result<Booking, EngineError> {
        let room_category_id = input.room_category_id;
        let result = self.try_create_booking(input).await;
        match &result {
            Ok(booking) => {
                metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
                info!(
                    "booking {} created on {} [{}, {}) {} {}",
                    booking.id,
                    room_category_id,
                    booking.start_at,
                    booking.end_at,
                    booking.total_price,
                    booking.currency
                );
            }
            Err(e) => {
                metrics::counter!(BOOKINGS_REJECTED_TOTAL, "reason" => e.kind()).increment(1);
                debug!("booking on {room_category_id} rejected: {e}");
            }
        }
        result
    }

    async fn try_create_booking(&self, input: BookingInput) -> Result<Booking, EngineError> {
        if input.start_at >= input.end_at {
            return Err(EngineError::InvalidRange);
        }
        let now = Self::now();
        if input.start_at.timestamp_millis() <= now.timestamp_millis() {
            return Err(EngineError::PastStartTime);
        }
        let span = validate_window(&input.start_at, &input.end_at)?;

        let room_category_id = input.room_category_id;
        let room = self.resolve_room(&room_category_id)?;
        let _gate = self.gate().await;
        let mut guard = room.write().await;
        if !self.store.contains_room(&room_category_id) {
            return Err(EngineError::room_category(room_category_id));
        }

        let property_id = guard.category.property_id;
        let property = self
            .store
            .get_property(&property_id)
            .ok_or_else(|| EngineError::property(property_id))?;
        if !property.is_active {
            return Err(EngineError::PropertyUnavailable(property_id));
        }

        if input.guests == 0 {
            return Err(EngineError::InvalidInput("at least one guest is required".into()));
        }
        if input.guests > guard.category.max_guests {
            return Err(EngineError::GuestCapacityExceeded {
                guests: input.guests,
                max: guard.category.max_guests,
            });
        }
        for (field, what) in [
            (&input.user_id, "user id too long"),
            (&input.guest_email, "guest email too long"),
            (&input.guest_phone, "guest phone too long"),
        ] {
            check_optional(field, MAX_CONTACT_LEN, what)?;
        }
        check_optional(&input.guest_name, MAX_NAME_LEN, "guest name too long")?;
        let currency = match input.currency.as_deref().map(str::trim) {
            None | Some("") => self.config.currency.clone(),
            Some(code) => {
                let code = code.to_ascii_uppercase();
                if !is_currency_code(&code) {
                    return Err(EngineError::InvalidInput(format!("invalid currency code '{code}'")));
                }
                code
            }
        };
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM_CATEGORY {
            return Err(EngineError::LimitExceeded("too many bookings on room category"));
        }

        check_no_conflict(&guard, &span)?;

        let requested = parse_stay_type(input.stay_type.as_deref())?;
        let price = quote(
            &guard.category,
            requested,
            &input.start_at,
            &input.end_at,
            &self.config.duration_rules,
        )?;

        let status = match input.status.as_deref() {
            None => BookingStatus::Pending,
            Some(s) => s.parse().map_err(EngineError::InvalidStatus)?,
        };

        let booking = Booking {
            id: Ulid::new(),
            room_category_id,
            property_id,
            user_id: input.user_id,
            guest_name: input.guest_name,
            guest_email: input.guest_email,
            guest_phone: input.guest_phone,
            guests: input.guests,
            stay_type: price.stay_type,
            start_at: input.start_at,
            end_at: input.end_at,
            total_price: price.total_price,
            currency,
            status,
            created_at: now,
        };
        self.commit_room(&mut guard, &Event::BookingCreated(booking.clone()))
            .await?;
        Ok(booking)
    }

    /// Move a booking along the status graph:
    /// PENDING → CONFIRMED | CANCELLED, CONFIRMED → COMPLETED | CANCELLED.
    pub async fn transition_status(&self, booking_id: Ulid, to: &str) -> Result<Booking, EngineError> {
        let to: BookingStatus = to.parse().map_err(EngineError::InvalidStatus)?;

        let _gate = self.gate().await;
        let mut guard = self.resolve_booking_write(&booking_id).await?;
        let booking = guard
            .bookings
            .iter()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| EngineError::booking(booking_id))?;
        let from = booking.status;
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        let event = Event::BookingStatusChanged {
            id: booking_id,
            room_category_id: booking.room_category_id,
            status: to,
        };
        self.commit_room(&mut guard, &event).await?;
        metrics::counter!(STATUS_TRANSITIONS_TOTAL, "to" => to.as_str()).increment(1);
        info!("booking {booking_id} {from} -> {to}");

        guard
            .bookings
            .iter()
            .find(|b| b.id == booking_id)
            .cloned()
            .ok_or_else(|| EngineError::booking(booking_id))
    }

    pub async fn cancel_booking(&self, booking_id: Ulid) -> Result<Booking, EngineError> {
        self.transition_status(booking_id, BookingStatus::Cancelled.as_str())
            .await
    }
}
