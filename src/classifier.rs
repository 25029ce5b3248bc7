//! Duration classification: maps a `[start, end)` window onto one of the
//! billable stay tiers. Timestamps are authoritative; a client-declared tier
//! is only cross-checked.

use thiserror::Error;

use crate::model::*;

/// Business rules for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationRules {
    /// Allowed drift around a same-day tier's nominal length.
    pub tolerance_ms: Ms,
    /// Longest nightly stay, in calendar nights.
    pub max_nights: u32,
}

impl Default for DurationRules {
    fn default() -> Self {
        Self {
            tolerance_ms: 6 * 60_000,
            max_nights: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub stay_type: StayType,
    /// Calendar nights covered. 0 for same-day tiers.
    pub nights: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("{0}")]
    InvalidDuration(String),
    #[error("duration mismatch: requested {requested} but duration corresponds to {derived}")]
    DurationMismatch { requested: StayType, derived: StayType },
}

fn format_hours(ms: Ms) -> String {
    format!("{:.2}h", ms as f64 / HOUR_MS as f64)
}

/// Derive the canonical stay type for a window.
pub fn classify(
    start: &Timestamp,
    end: &Timestamp,
    requested: Option<StayType>,
    rules: &DurationRules,
) -> Result<Classification, ClassifyError> {
    let duration = end.timestamp_millis() - start.timestamp_millis();
    let start_date = start.date_naive();
    let end_date = end.date_naive();

    let same_day_tier = if start_date == end_date {
        [StayType::FourHours, StayType::SixHours, StayType::TwelveHours]
            .into_iter()
            .find(|t| {
                t.same_day_ms()
                    .is_some_and(|nominal| (duration - nominal).abs() <= rules.tolerance_ms)
            })
    } else {
        None
    };

    let derived = match same_day_tier {
        Some(stay_type) => Classification { stay_type, nights: 0 },
        None => {
            let days = (end_date - start_date).num_days();
            if days < 1 {
                return Err(ClassifyError::InvalidDuration(format!(
                    "duration must be exactly 4h, 6h, 12h (same calendar day) or 24h+ (spanning multiple days); got {}",
                    format_hours(duration)
                )));
            }
            if days > i64::from(rules.max_nights) {
                return Err(ClassifyError::InvalidDuration(format!(
                    "24h-tier bookings cannot exceed {} nights; got {days}",
                    rules.max_nights
                )));
            }
            Classification {
                stay_type: StayType::Nightly,
                nights: days as u32,
            }
        }
    };

    if let Some(requested) = requested
        && requested != derived.stay_type
    {
        return Err(ClassifyError::DurationMismatch {
            requested,
            derived: derived.stay_type,
        });
    }

    Ok(derived)
}
