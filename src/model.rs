use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, used for all interval arithmetic.
pub type Ms = i64;

/// Timestamps keep the caller's offset so calendar dates stay local.
pub type Timestamp = DateTime<FixedOffset>;

pub const HOUR_MS: Ms = 3_600_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn from_timestamps(start: &Timestamp, end: &Timestamp) -> Self {
        Self::new(start.timestamp_millis(), end.timestamp_millis())
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are read as local
/// time in `default_offset`.
pub fn parse_timestamp(text: &str, default_offset: FixedOffset) -> Result<Timestamp, String> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return naive
                .and_local_timezone(default_offset)
                .single()
                .ok_or_else(|| format!("ambiguous local time '{text}'"));
        }
    }
    Err(format!("invalid timestamp '{text}'"))
}

// ── Stay types ──────────────────────────────────────────────────

/// The four billable duration tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StayType {
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    /// Per-night tier; a stay spanning N calendar days is billed N nights.
    #[serde(rename = "24h")]
    Nightly,
}

impl StayType {
    pub const ALL: [StayType; 4] = [
        StayType::FourHours,
        StayType::SixHours,
        StayType::TwelveHours,
        StayType::Nightly,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            StayType::FourHours => "4h",
            StayType::SixHours => "6h",
            StayType::TwelveHours => "12h",
            StayType::Nightly => "24h",
        }
    }

    /// Nominal length of a same-day tier. `None` for the nightly tier.
    pub fn same_day_ms(&self) -> Option<Ms> {
        match self {
            StayType::FourHours => Some(4 * HOUR_MS),
            StayType::SixHours => Some(6 * HOUR_MS),
            StayType::TwelveHours => Some(12 * HOUR_MS),
            StayType::Nightly => None,
        }
    }
}

impl fmt::Display for StayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for StayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StayType::ALL
            .into_iter()
            .find(|t| t.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stay type '{s}'"))
    }
}

// ── Booking status ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// PENDING and CONFIRMED bookings still hold their slot in the future.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Whether the booking still blocks its slot for overlap purposes.
    pub fn occupies_slot(&self) -> bool {
        *self != BookingStatus::Cancelled
    }

    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            _ => Err(s.to_string()),
        }
    }
}

// ── Catalog ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: Ulid,
    pub owner_id: Option<String>,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProperty {
    pub owner_id: Option<String>,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub is_active: Option<bool>,
}

/// Unit price per stay tier, in the engine's single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    pub price_4h: Decimal,
    pub price_6h: Decimal,
    pub price_12h: Decimal,
    pub price_24h: Decimal,
}

impl RateTable {
    pub fn unit_price(&self, stay_type: StayType) -> Decimal {
        match stay_type {
            StayType::FourHours => self.price_4h,
            StayType::SixHours => self.price_6h,
            StayType::TwelveHours => self.price_12h,
            StayType::Nightly => self.price_24h,
        }
    }

    pub fn has_negative(&self) -> bool {
        StayType::ALL
            .iter()
            .any(|t| self.unit_price(*t) < Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCategory {
    pub id: Ulid,
    pub property_id: Ulid,
    pub name: String,
    pub max_guests: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub floor_area_sqft: Option<u32>,
    pub rates: RateTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoomCategory {
    pub name: String,
    pub max_guests: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub floor_area_sqft: Option<u32>,
    pub rates: RateTable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCategoryPatch {
    pub name: Option<String>,
    pub max_guests: Option<u32>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub floor_area_sqft: Option<u32>,
    pub price_4h: Option<Decimal>,
    pub price_6h: Option<Decimal>,
    pub price_12h: Option<Decimal>,
    pub price_24h: Option<Decimal>,
}

// ── Bookings ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub room_category_id: Ulid,
    pub property_id: Ulid,
    pub user_id: Option<String>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guests: u32,
    pub stay_type: StayType,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    pub total_price: Decimal,
    pub currency: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::from_timestamps(&self.start_at, &self.end_at)
    }
}

/// Caller-supplied booking request. Price is deliberately absent: a
/// `totalPrice` key in the incoming JSON is dropped during deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingInput {
    pub room_category_id: Ulid,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    #[serde(default)]
    pub guest_phone: Option<String>,
    pub guests: u32,
    /// Advisory only; cross-checked against the timestamps.
    #[serde(default)]
    pub stay_type: Option<String>,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Server-computed price for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub total_price: Decimal,
    pub stay_type: StayType,
    pub nights: u32,
}

// ── Room state ──────────────────────────────────────────────────

/// A room category together with every booking ever made against it.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub category: RoomCategory,
    /// Sorted by `start_at`.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(category: RoomCategory) -> Self {
        Self {
            category,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let start = booking.start_at.timestamp_millis();
        let pos = self
            .bookings
            .partition_point(|b| b.start_at.timestamp_millis() <= start);
        self.bookings.insert(pos, booking);
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn has_active_bookings(&self) -> bool {
        self.bookings.iter().any(|b| b.status.is_active())
    }

    /// Bookings whose span overlaps the query window, regardless of status.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.start_at.timestamp_millis() < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span().overlaps(query))
    }
}

/// The event types. This is the journal record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    PropertyCreated(Property),
    PropertyUpdated(Property),
    PropertyDeleted { id: Ulid },
    RoomCategoryCreated(RoomCategory),
    RoomCategoryUpdated(RoomCategory),
    RoomCategoryDeleted { id: Ulid, property_id: Ulid },
    BookingCreated(Booking),
    BookingStatusChanged {
        id: Ulid,
        room_category_id: Ulid,
        status: BookingStatus,
    },
}
