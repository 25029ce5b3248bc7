use super::*;
use super::availability::Verdict;
use super::conflict::validate_window;

use async_trait::async_trait;
use chrono::{Duration, FixedOffset, TimeZone};
use rust_decimal_macros::dec;

use crate::journal::{Journal, JournalError};

fn dhaka() -> FixedOffset {
    FixedOffset::east_opt(6 * 3600).unwrap()
}

/// `days` days from today at `h:m`, local to +06:00.
fn day_at(days: i64, h: u32, m: u32) -> Timestamp {
    let tz = dhaka();
    let date = (Utc::now().with_timezone(&tz) + Duration::days(days)).date_naive();
    tz.from_local_datetime(&date.and_hms_opt(h, m, 0).unwrap())
        .unwrap()
}

fn tomorrow(h: u32, m: u32) -> Timestamp {
    day_at(1, h, m)
}

fn rates() -> RateTable {
    RateTable {
        price_4h: dec!(1200.00),
        price_6h: dec!(1600.00),
        price_12h: dec!(2600.00),
        price_24h: dec!(4000.00),
    }
}

fn new_room(name: &str) -> NewRoomCategory {
    NewRoomCategory {
        name: name.into(),
        max_guests: 3,
        bedrooms: 1,
        bathrooms: 1,
        floor_area_sqft: Some(420),
        rates: rates(),
    }
}

fn engine() -> Engine {
    Engine::in_memory(EngineConfig::default())
}

/// Active property with one room category.
async fn seed(engine: &Engine) -> (Ulid, Ulid) {
    let property_id = Ulid::new();
    engine
        .create_property(
            property_id,
            NewProperty {
                owner_id: Some("owner-7".into()),
                name: "Cox's Bazar Sea Pearl".into(),
                location: Some("Cox's Bazar".into()),
                is_active: true,
            },
        )
        .await
        .unwrap();
    let room_id = Ulid::new();
    engine
        .create_room_category(room_id, property_id, new_room("Deluxe Room"))
        .await
        .unwrap();
    (property_id, room_id)
}

fn request(room_id: Ulid, start: Timestamp, end: Timestamp, stay_type: Option<&str>) -> BookingInput {
    BookingInput {
        room_category_id: room_id,
        user_id: Some("user-42".into()),
        guest_name: Some("Nadia Rahman".into()),
        guest_email: None,
        guest_phone: None,
        guests: 2,
        stay_type: stay_type.map(str::to_string),
        start_at: start,
        end_at: end,
        status: Some("PENDING".into()),
        currency: None,
    }
}

// ── Catalog ──────────────────────────────────────────────

#[tokio::test]
async fn catalog_create_and_read_back() {
    let engine = engine();
    let (property_id, room_id) = seed(&engine).await;

    let property = engine.get_property(property_id).unwrap();
    assert!(property.is_active);
    assert_eq!(engine.list_properties(), vec![property]);

    let rooms = engine.list_room_categories(property_id).await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, room_id);
    assert_eq!(engine.get_room_category(room_id).await.unwrap().rates, rates());
}

#[tokio::test]
async fn catalog_duplicate_property_rejected() {
    let engine = engine();
    let (property_id, _) = seed(&engine).await;
    let result = engine
        .create_property(property_id, NewProperty { name: "Again".into(), ..Default::default() })
        .await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(id)) if id == property_id));
}

#[tokio::test]
async fn catalog_room_needs_property() {
    let engine = engine();
    let result = engine
        .create_room_category(Ulid::new(), Ulid::new(), new_room("Orphan"))
        .await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "property", .. })));
}

#[tokio::test]
async fn catalog_rejects_bad_room_fields() {
    let engine = engine();
    let (property_id, _) = seed(&engine).await;

    let mut negative = new_room("Cheap");
    negative.rates.price_6h = dec!(-1);
    let result = engine.create_room_category(Ulid::new(), property_id, negative).await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    let mut nobody = new_room("Closet");
    nobody.max_guests = 0;
    let result = engine.create_room_category(Ulid::new(), property_id, nobody).await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    let result = engine.create_room_category(Ulid::new(), property_id, new_room("  ")).await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
}

#[tokio::test]
async fn catalog_patch_room_category() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let updated = engine
        .update_room_category(
            room_id,
            RoomCategoryPatch {
                name: Some("Premium Deluxe".into()),
                price_4h: Some(dec!(1500.00)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Premium Deluxe");
    assert_eq!(updated.rates.price_4h, dec!(1500.00));
    assert_eq!(updated.rates.price_24h, dec!(4000.00));
    assert_eq!(updated.max_guests, 3);
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn availability_empty_room_is_free() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let free = engine
        .check_availability(room_id, tomorrow(10, 0), tomorrow(14, 0), None)
        .await
        .unwrap();
    assert!(free);
}

#[tokio::test]
async fn availability_half_open_boundaries() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    engine
        .create_booking(request(room_id, tomorrow(10, 0), tomorrow(14, 0), Some("4h")))
        .await
        .unwrap();

    // Touching the end is fine.
    assert!(engine
        .check_availability(room_id, tomorrow(14, 0), tomorrow(18, 0), None)
        .await
        .unwrap());
    // Touching the start is fine.
    assert!(engine
        .check_availability(room_id, tomorrow(6, 0), tomorrow(10, 0), None)
        .await
        .unwrap());
    // One minute of overlap conflicts.
    assert!(!engine
        .check_availability(room_id, tomorrow(13, 59), tomorrow(18, 0), None)
        .await
        .unwrap());
    // Fully containing conflicts.
    assert!(!engine
        .check_availability(room_id, tomorrow(8, 0), tomorrow(20, 0), None)
        .await
        .unwrap());
}

#[tokio::test]
async fn availability_ignores_cancelled() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(10, 0), tomorrow(14, 0), None))
        .await
        .unwrap();
    engine.cancel_booking(booking.id).await.unwrap();
    assert!(engine
        .check_availability(room_id, tomorrow(10, 0), tomorrow(14, 0), None)
        .await
        .unwrap());
}

#[tokio::test]
async fn availability_completed_still_blocks() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(10, 0), tomorrow(14, 0), None))
        .await
        .unwrap();
    engine.transition_status(booking.id, "CONFIRMED").await.unwrap();
    engine.transition_status(booking.id, "COMPLETED").await.unwrap();
    assert!(!engine
        .check_availability(room_id, tomorrow(12, 0), tomorrow(16, 0), None)
        .await
        .unwrap());
}

#[tokio::test]
async fn availability_exclude_own_booking() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(10, 0), tomorrow(14, 0), None))
        .await
        .unwrap();
    assert!(engine
        .check_availability(room_id, tomorrow(12, 0), tomorrow(16, 0), Some(booking.id))
        .await
        .unwrap());
    assert!(!engine
        .check_availability(room_id, tomorrow(12, 0), tomorrow(16, 0), Some(Ulid::new()))
        .await
        .unwrap());
}

#[tokio::test]
async fn availability_inactive_property_is_unavailable() {
    let engine = engine();
    let (property_id, room_id) = seed(&engine).await;
    engine
        .update_property(property_id, PropertyPatch { is_active: Some(false), ..Default::default() })
        .await
        .unwrap();
    assert!(!engine
        .check_availability(room_id, tomorrow(10, 0), tomorrow(14, 0), None)
        .await
        .unwrap());
}

#[tokio::test]
async fn availability_errors() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let missing = engine
        .check_availability(Ulid::new(), tomorrow(10, 0), tomorrow(14, 0), None)
        .await;
    assert!(matches!(missing, Err(EngineError::NotFound { entity: "room category", .. })));
    let reversed = engine
        .check_availability(room_id, tomorrow(14, 0), tomorrow(10, 0), None)
        .await;
    assert!(matches!(reversed, Err(EngineError::InvalidRange)));
}

#[tokio::test]
async fn availability_dangling_property_is_not_found() {
    // A room category whose property never made it into the journal.
    let orphan = RoomCategory {
        id: Ulid::new(),
        property_id: Ulid::new(),
        name: "Ghost Room".into(),
        max_guests: 2,
        bedrooms: 1,
        bathrooms: 1,
        floor_area_sqft: None,
        rates: rates(),
    };
    let engine = Engine::with_journal(
        Arc::new(crate::journal::MemoryJournal::new()),
        EngineConfig::default(),
        &[Event::RoomCategoryCreated(orphan.clone())],
    );
    let result = engine
        .check_availability(orphan.id, tomorrow(10, 0), tomorrow(14, 0), None)
        .await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "property", .. })));
    let result = engine
        .create_booking(request(orphan.id, tomorrow(10, 0), tomorrow(14, 0), None))
        .await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "property", .. })));
}

#[tokio::test]
async fn property_wide_availability() {
    let engine = engine();
    let (property_id, room_a) = seed(&engine).await;
    let room_b = Ulid::new();
    engine
        .create_room_category(room_b, property_id, new_room("Twin Room"))
        .await
        .unwrap();

    assert!(engine
        .is_property_available(property_id, tomorrow(10, 0), tomorrow(14, 0))
        .await
        .unwrap());

    engine
        .create_booking(request(room_b, tomorrow(10, 0), tomorrow(14, 0), None))
        .await
        .unwrap();
    assert!(!engine
        .is_property_available(property_id, tomorrow(12, 0), tomorrow(16, 0))
        .await
        .unwrap());
    assert!(engine
        .is_property_available(property_id, tomorrow(14, 0), tomorrow(18, 0))
        .await
        .unwrap());

    let free = engine
        .available_room_categories(property_id, tomorrow(12, 0), tomorrow(16, 0))
        .await
        .unwrap();
    assert_eq!(free.iter().map(|c| c.id).collect::<Vec<_>>(), vec![room_a]);
}

#[tokio::test]
async fn property_without_rooms_is_unavailable() {
    let engine = engine();
    let id = Ulid::new();
    engine
        .create_property(id, NewProperty { name: "Empty Villa".into(), is_active: true, ..Default::default() })
        .await
        .unwrap();
    assert!(!engine
        .is_property_available(id, tomorrow(10, 0), tomorrow(14, 0))
        .await
        .unwrap());
    let verdict = engine
        .property_verdict(id, tomorrow(10, 0), tomorrow(14, 0))
        .await
        .unwrap();
    assert_eq!(verdict, Verdict::Empty);
    assert_eq!(verdict.label(), "empty");
    let missing = engine
        .is_property_available(Ulid::new(), tomorrow(10, 0), tomorrow(14, 0))
        .await;
    assert!(matches!(missing, Err(EngineError::NotFound { entity: "property", .. })));
}

// ── Pricing ──────────────────────────────────────────────

#[tokio::test]
async fn price_four_hour_tier() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let quote = engine
        .compute_price(room_id, Some("4h"), tomorrow(9, 0), tomorrow(13, 0))
        .await
        .unwrap();
    assert_eq!(quote.total_price, dec!(1200.00));
    assert_eq!(quote.stay_type, StayType::FourHours);
}

#[tokio::test]
async fn price_multi_night() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let quote = engine
        .compute_price(room_id, None, day_at(1, 9, 0), day_at(3, 11, 0))
        .await
        .unwrap();
    assert_eq!(quote.stay_type, StayType::Nightly);
    assert_eq!(quote.nights, 2);
    assert_eq!(quote.total_price, dec!(8000.00));
}

#[tokio::test]
async fn price_errors() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;

    let mismatch = engine
        .compute_price(room_id, Some("6h"), tomorrow(9, 0), tomorrow(13, 0))
        .await;
    assert!(matches!(mismatch, Err(EngineError::DurationMismatch { .. })));

    let off_tier = engine
        .compute_price(room_id, None, tomorrow(9, 0), tomorrow(13, 7))
        .await;
    assert!(matches!(off_tier, Err(EngineError::InvalidDuration(_))));

    let too_long = engine
        .compute_price(room_id, None, day_at(1, 12, 0), day_at(17, 12, 0))
        .await;
    assert!(matches!(too_long, Err(EngineError::InvalidDuration(_))));

    let unknown = engine
        .compute_price(room_id, Some("2h"), tomorrow(9, 0), tomorrow(13, 0))
        .await;
    assert!(matches!(unknown, Err(EngineError::InvalidDuration(_))));

    let missing = engine
        .compute_price(Ulid::new(), None, tomorrow(9, 0), tomorrow(13, 0))
        .await;
    assert!(matches!(missing, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn price_unknown_room_reported_before_bad_tag() {
    let engine = engine();
    let result = engine
        .compute_price(Ulid::new(), Some("3h"), tomorrow(9, 0), tomorrow(13, 0))
        .await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "room category", .. })));
}

// ── Booking transaction ──────────────────────────────────

#[tokio::test]
async fn booking_end_to_end() {
    let engine = engine();
    let (property_id, room_id) = seed(&engine).await;

    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), Some("4h")))
        .await
        .unwrap();
    assert_eq!(booking.total_price.to_string(), "1200.00");
    assert_eq!(booking.stay_type, StayType::FourHours);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.property_id, property_id);
    assert_eq!(booking.currency, "BDT");
    assert_eq!(engine.get_booking(booking.id).await.unwrap(), booking);

    let second = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), Some("4h")))
        .await;
    assert!(matches!(second, Err(EngineError::SlotConflict(id)) if id == booking.id));
}

#[tokio::test]
async fn booking_price_cannot_be_tampered() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let json = serde_json::json!({
        "roomCategoryId": room_id.to_string(),
        "guests": 1,
        "stayType": "4h",
        "startAt": tomorrow(9, 0).to_rfc3339(),
        "endAt": tomorrow(13, 0).to_rfc3339(),
        "totalPrice": 1,
    });
    let input: BookingInput = serde_json::from_value(json).unwrap();
    let booking = engine.create_booking(input).await.unwrap();
    assert_eq!(booking.total_price, dec!(1200.00));
}

#[tokio::test]
async fn booking_derives_stay_type_when_absent() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, day_at(2, 14, 0), day_at(5, 11, 0), None))
        .await
        .unwrap();
    assert_eq!(booking.stay_type, StayType::Nightly);
    assert_eq!(booking.total_price, dec!(12000.00));
}

#[tokio::test]
async fn booking_validation_order() {
    let engine = engine();
    let (property_id, room_id) = seed(&engine).await;

    let reversed = engine
        .create_booking(request(room_id, tomorrow(13, 0), tomorrow(9, 0), None))
        .await;
    assert!(matches!(reversed, Err(EngineError::InvalidRange)));

    let past = engine
        .create_booking(request(room_id, day_at(-1, 9, 0), day_at(-1, 13, 0), None))
        .await;
    assert!(matches!(past, Err(EngineError::PastStartTime)));

    // Range is checked before the room even exists.
    let missing = engine
        .create_booking(request(Ulid::new(), tomorrow(13, 0), tomorrow(13, 0), None))
        .await;
    assert!(matches!(missing, Err(EngineError::InvalidRange)));

    let missing = engine
        .create_booking(request(Ulid::new(), tomorrow(9, 0), tomorrow(13, 0), None))
        .await;
    assert!(matches!(missing, Err(EngineError::NotFound { entity: "room category", .. })));

    engine
        .update_property(property_id, PropertyPatch { is_active: Some(false), ..Default::default() })
        .await
        .unwrap();
    let inactive = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await;
    assert!(matches!(inactive, Err(EngineError::PropertyUnavailable(id)) if id == property_id));
}

#[tokio::test]
async fn booking_conflict_reported_before_pricing_and_status() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();

    let mut bad = request(room_id, tomorrow(10, 0), tomorrow(17, 0), Some("6h"));
    bad.status = Some("ARCHIVED".into());
    let result = engine.create_booking(bad).await;
    assert!(matches!(result, Err(EngineError::SlotConflict(_))));
}

#[tokio::test]
async fn booking_pricing_before_status() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let mut bad = request(room_id, tomorrow(9, 0), tomorrow(13, 0), Some("6h"));
    bad.status = Some("ARCHIVED".into());
    let result = engine.create_booking(bad).await;
    assert!(matches!(result, Err(EngineError::DurationMismatch { .. })));

    let mut bad = request(room_id, tomorrow(9, 0), tomorrow(13, 0), Some("4h"));
    bad.status = Some("ARCHIVED".into());
    let result = engine.create_booking(bad).await;
    assert!(matches!(result, Err(EngineError::InvalidStatus(s)) if s == "ARCHIVED"));
    assert!(engine.list_bookings(room_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn booking_status_defaults_to_pending() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let mut input = request(room_id, tomorrow(9, 0), tomorrow(13, 0), None);
    input.status = None;
    let booking = engine.create_booking(input).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn booking_guest_and_currency_checks() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;

    let mut crowd = request(room_id, tomorrow(9, 0), tomorrow(13, 0), None);
    crowd.guests = 4;
    assert!(matches!(
        engine.create_booking(crowd).await,
        Err(EngineError::GuestCapacityExceeded { guests: 4, max: 3 })
    ));

    let mut nobody = request(room_id, tomorrow(9, 0), tomorrow(13, 0), None);
    nobody.guests = 0;
    assert!(matches!(engine.create_booking(nobody).await, Err(EngineError::InvalidInput(_))));

    let mut weird = request(room_id, tomorrow(9, 0), tomorrow(13, 0), None);
    weird.currency = Some("taka".into());
    assert!(matches!(engine.create_booking(weird).await, Err(EngineError::InvalidInput(_))));

    let mut usd = request(room_id, tomorrow(9, 0), tomorrow(13, 0), None);
    usd.currency = Some("usd".into());
    assert_eq!(engine.create_booking(usd).await.unwrap().currency, "USD");
}

#[tokio::test]
async fn booking_price_survives_rate_change() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    engine
        .update_room_category(room_id, RoomCategoryPatch { price_4h: Some(dec!(9999)), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(engine.get_booking(booking.id).await.unwrap().total_price, dec!(1200.00));
    let quote = engine
        .compute_price(room_id, None, tomorrow(15, 0), tomorrow(19, 0))
        .await
        .unwrap();
    assert_eq!(quote.total_price, dec!(9999));
}

#[tokio::test]
async fn bookings_listed_per_room_and_user() {
    let engine = engine();
    let (property_id, room_a) = seed(&engine).await;
    let room_b = Ulid::new();
    engine
        .create_room_category(room_b, property_id, new_room("Suite"))
        .await
        .unwrap();

    let late = engine
        .create_booking(request(room_a, tomorrow(15, 0), tomorrow(19, 0), None))
        .await
        .unwrap();
    let early = engine
        .create_booking(request(room_b, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    let mut stranger = request(room_a, tomorrow(9, 0), tomorrow(13, 0), None);
    stranger.user_id = Some("user-99".into());
    engine.create_booking(stranger).await.unwrap();

    let mine: Vec<Ulid> = engine
        .list_bookings_for_user("user-42")
        .await
        .iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(mine, vec![early.id, late.id]);
    assert_eq!(engine.list_bookings(room_a).await.unwrap().len(), 2);
}

// ── Status transitions ───────────────────────────────────

#[tokio::test]
async fn status_happy_path() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    let confirmed = engine.transition_status(booking.id, "CONFIRMED").await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    let completed = engine.transition_status(booking.id, "COMPLETED").await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    assert_eq!(completed.total_price, booking.total_price);
}

#[tokio::test]
async fn status_illegal_moves() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();

    let skip = engine.transition_status(booking.id, "COMPLETED").await;
    assert!(matches!(
        skip,
        Err(EngineError::InvalidTransition { from: BookingStatus::Pending, to: BookingStatus::Completed })
    ));

    engine.transition_status(booking.id, "CONFIRMED").await.unwrap();
    let back = engine.transition_status(booking.id, "PENDING").await;
    assert!(matches!(
        back,
        Err(EngineError::InvalidTransition { from: BookingStatus::Confirmed, to: BookingStatus::Pending })
    ));

    engine.cancel_booking(booking.id).await.unwrap();
    let revive = engine.transition_status(booking.id, "CONFIRMED").await;
    assert!(matches!(
        revive,
        Err(EngineError::InvalidTransition { from: BookingStatus::Cancelled, to: BookingStatus::Confirmed })
    ));
}

#[tokio::test]
async fn status_unknown_value_checked_first() {
    let engine = engine();
    // Unknown status wins even over a missing booking.
    let result = engine.transition_status(Ulid::new(), "REFUNDED").await;
    assert!(matches!(result, Err(EngineError::InvalidStatus(s)) if s == "REFUNDED"));
    let result = engine.transition_status(Ulid::new(), "CONFIRMED").await;
    assert!(matches!(result, Err(EngineError::NotFound { entity: "booking", .. })));
}

#[tokio::test]
async fn cancel_frees_slot_for_rebooking() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let first = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    engine.cancel_booking(first.id).await.unwrap();
    let second = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(engine.list_bookings(room_id).await.unwrap().len(), 2);
}

// ── Deletion ─────────────────────────────────────────────

#[tokio::test]
async fn delete_room_with_active_booking_refused() {
    let engine = engine();
    let (_, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    assert!(matches!(
        engine.delete_room_category(room_id).await,
        Err(EngineError::HasActiveBookings(id)) if id == room_id
    ));

    engine.cancel_booking(booking.id).await.unwrap();
    engine.delete_room_category(room_id).await.unwrap();
    assert!(matches!(engine.get_room_category(room_id).await, Err(EngineError::NotFound { .. })));
    assert!(matches!(engine.get_booking(booking.id).await, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn delete_property_cascades() {
    let engine = engine();
    let (property_id, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    assert!(matches!(
        engine.delete_property(property_id).await,
        Err(EngineError::HasActiveBookings(_))
    ));

    engine.transition_status(booking.id, "CONFIRMED").await.unwrap();
    engine.transition_status(booking.id, "COMPLETED").await.unwrap();
    engine.delete_property(property_id).await.unwrap();

    assert!(engine.get_property(property_id).is_err());
    assert!(engine.get_room_category(room_id).await.is_err());
    assert!(engine.list_properties().is_empty());
}

// ── Journal ──────────────────────────────────────────────

struct BrokenJournal;

#[async_trait]
impl Journal for BrokenJournal {
    async fn append(&self, _event: &Event) -> Result<(), JournalError> {
        Err(JournalError("disk full".into()))
    }

    async fn compact(&self, _events: Vec<Event>) -> Result<(), JournalError> {
        Err(JournalError("disk full".into()))
    }

    async fn appends_since_compact(&self) -> u64 {
        0
    }
}

#[tokio::test]
async fn journal_failure_leaves_state_untouched() {
    let (property_id, room_id) = (Ulid::new(), Ulid::new());
    let history = vec![
        Event::PropertyCreated(Property {
            id: property_id,
            owner_id: None,
            name: "Sylhet Hills Resort".into(),
            location: None,
            is_active: true,
        }),
        Event::RoomCategoryCreated(RoomCategory {
            id: room_id,
            property_id,
            name: "Cottage".into(),
            max_guests: 2,
            bedrooms: 1,
            bathrooms: 1,
            floor_area_sqft: None,
            rates: rates(),
        }),
    ];
    let engine = Engine::with_journal(Arc::new(BrokenJournal), EngineConfig::default(), &history);

    let result = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await;
    assert!(matches!(result, Err(EngineError::Journal(_))));
    assert!(!result.unwrap_err().is_client_error());
    assert!(engine.list_bookings(room_id).await.unwrap().is_empty());
    assert!(engine.compact_journal().await.is_err());
}

#[tokio::test]
async fn replay_rebuilds_state() {
    let journal = Arc::new(crate::journal::MemoryJournal::new());
    let engine = Engine::with_journal(journal.clone(), EngineConfig::default(), &[]);
    let (_, room_id) = seed(&engine).await;
    let kept = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    let cancelled = engine
        .create_booking(request(room_id, tomorrow(15, 0), tomorrow(19, 0), None))
        .await
        .unwrap();
    engine.cancel_booking(cancelled.id).await.unwrap();

    let rebuilt = Engine::with_journal(
        Arc::new(crate::journal::MemoryJournal::new()),
        EngineConfig::default(),
        &journal.events(),
    );
    assert_eq!(rebuilt.get_booking(kept.id).await.unwrap(), kept);
    assert_eq!(
        rebuilt.get_booking(cancelled.id).await.unwrap().status,
        BookingStatus::Cancelled
    );
    assert!(rebuilt
        .check_availability(room_id, tomorrow(15, 0), tomorrow(19, 0), None)
        .await
        .unwrap());
}

#[tokio::test]
async fn compaction_snapshot_replays_identically() {
    let journal = Arc::new(crate::journal::MemoryJournal::new());
    let engine = Engine::with_journal(journal.clone(), EngineConfig::default(), &[]);
    let (property_id, room_id) = seed(&engine).await;
    let booking = engine
        .create_booking(request(room_id, tomorrow(9, 0), tomorrow(13, 0), None))
        .await
        .unwrap();
    engine.transition_status(booking.id, "CONFIRMED").await.unwrap();
    engine
        .update_room_category(room_id, RoomCategoryPatch { bedrooms: Some(2), ..Default::default() })
        .await
        .unwrap();

    engine.compact_journal().await.unwrap();
    let events = journal.events();
    assert_eq!(events.len(), 3);

    let rebuilt = Engine::with_journal(
        Arc::new(crate::journal::MemoryJournal::new()),
        EngineConfig::default(),
        &events,
    );
    assert_eq!(rebuilt.get_property(property_id).unwrap(), engine.get_property(property_id).unwrap());
    assert_eq!(rebuilt.get_room_category(room_id).await.unwrap().bedrooms, 2);
    assert_eq!(
        rebuilt.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

// ── Pure helpers ─────────────────────────────────────────

#[test]
fn validate_window_limits() {
    let tz = dhaka();
    let ancient_start = tz.with_ymd_and_hms(1990, 1, 1, 9, 0, 0).unwrap();
    let ancient_end = tz.with_ymd_and_hms(1990, 1, 1, 13, 0, 0).unwrap();
    assert!(matches!(
        validate_window(&ancient_start, &ancient_end),
        Err(EngineError::LimitExceeded(_))
    ));
    let start = tz.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
    assert!(matches!(validate_window(&start, &start), Err(EngineError::InvalidRange)));
}

#[test]
fn find_conflict_skips_cancelled_and_excluded() {
    let tz = dhaka();
    let t = |h| tz.with_ymd_and_hms(2030, 1, 1, h, 0, 0).unwrap();
    let mut rs = RoomState::new(RoomCategory {
        id: Ulid::new(),
        property_id: Ulid::new(),
        name: "Standard".into(),
        max_guests: 2,
        bedrooms: 1,
        bathrooms: 1,
        floor_area_sqft: None,
        rates: rates(),
    });
    let mk = |start, end, status| Booking {
        id: Ulid::new(),
        room_category_id: rs.category.id,
        property_id: rs.category.property_id,
        user_id: None,
        guest_name: None,
        guest_email: None,
        guest_phone: None,
        guests: 1,
        stay_type: StayType::FourHours,
        start_at: start,
        end_at: end,
        total_price: dec!(1200.00),
        currency: "BDT".into(),
        status,
        created_at: Utc::now(),
    };
    let cancelled = mk(t(9), t(13), BookingStatus::Cancelled);
    let live = mk(t(11), t(15), BookingStatus::Confirmed);
    let live_id = live.id;
    rs.insert_booking(cancelled);
    rs.insert_booking(live);

    let span = Span::from_timestamps(&t(9), &t(12));
    assert_eq!(find_conflict(&rs, &span, None), Some(live_id));
    assert_eq!(find_conflict(&rs, &span, Some(live_id)), None);
    let before = Span::from_timestamps(&t(9), &t(11));
    assert_eq!(find_conflict(&rs, &before, None), None);
}
