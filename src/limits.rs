/// Max length for property, room-category and guest names.
pub const MAX_NAME_LEN: usize = 200;

/// Max length for free-form location strings.
pub const MAX_LOCATION_LEN: usize = 500;

/// Max length for user ids and guest contact fields.
pub const MAX_CONTACT_LEN: usize = 320;

pub const MAX_PROPERTIES: usize = 100_000;

pub const MAX_ROOM_CATEGORIES_PER_PROPERTY: usize = 256;

pub const MAX_BOOKINGS_PER_ROOM_CATEGORY: usize = 100_000;

pub const MAX_GUESTS_PER_ROOM_CATEGORY: u32 = 100;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: i64 = 946_684_800_000;

/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: i64 = 7_258_118_400_000;
