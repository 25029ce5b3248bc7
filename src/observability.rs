//! Metric names. The crate records through the `metrics` facade; installing an
//! exporter is up to the host process.

// ── Booking flow ────────────────────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "qayamgah_bookings_created_total";

/// Counter: booking requests rejected. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "qayamgah_bookings_rejected_total";

/// Counter: availability checks answered. Labels: result (available, taken, inactive).
pub const AVAILABILITY_CHECKS_TOTAL: &str = "qayamgah_availability_checks_total";

/// Counter: price previews served. Labels: stay_type.
pub const PRICE_QUOTES_TOTAL: &str = "qayamgah_price_quotes_total";

/// Counter: status changes applied. Labels: to.
pub const STATUS_TRANSITIONS_TOTAL: &str = "qayamgah_status_transitions_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "qayamgah_journal_flush_duration_seconds";

/// Histogram: events per journal flush.
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "qayamgah_journal_flush_batch_size";

/// Counter: journal compactions. Labels: status.
pub const JOURNAL_COMPACTIONS_TOTAL: &str = "qayamgah_journal_compactions_total";

/// Gauge: room categories currently loaded.
pub const ROOM_CATEGORIES_ACTIVE: &str = "qayamgah_room_categories_active";
