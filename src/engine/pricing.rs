use rust_decimal::Decimal;
use tracing::debug;
use ulid::Ulid;

use crate::classifier::{DurationRules, classify};
use crate::model::*;

use super::{Engine, EngineError};

/// Parse a caller-declared stay type. Blank means "not declared".
pub(crate) fn parse_stay_type(tag: Option<&str>) -> Result<Option<StayType>, EngineError> {
    match tag.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => t.parse().map(Some).map_err(EngineError::InvalidDuration),
    }
}

/// Server-side price for `[start, end)` in `category`.
///
/// The tier comes from the timestamps; `requested` only has to agree with it.
/// Nightly stays are billed per calendar night, everything else is flat.
pub fn quote(
    category: &RoomCategory,
    requested: Option<StayType>,
    start: &Timestamp,
    end: &Timestamp,
    rules: &DurationRules,
) -> Result<PriceQuote, EngineError> {
    let class = classify(start, end, requested, rules)?;
    let unit = category.rates.unit_price(class.stay_type);
    let total_price = match class.stay_type {
        StayType::Nightly => unit
            .checked_mul(Decimal::from(class.nights))
            .ok_or_else(|| EngineError::PricingFailed(format!("{unit} x {} nights overflows", class.nights)))?,
        _ => unit,
    };
    if total_price < Decimal::ZERO {
        return Err(EngineError::PricingFailed(format!(
            "negative total {total_price} for {}",
            category.id
        )));
    }
    Ok(PriceQuote {
        total_price,
        stay_type: class.stay_type,
        nights: class.nights,
    })
}

impl Engine {
    /// Price preview for a window, as shown before checkout.
    pub async fn compute_price(
        &self,
        room_category_id: Ulid,
        stay_type: Option<&str>,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<PriceQuote, EngineError> {
        let room = self.resolve_room(&room_category_id)?;
        let requested = parse_stay_type(stay_type)?;
        let guard = room.read().await;
        let result = quote(&guard.category, requested, &start, &end, &self.config.duration_rules);
        match &result {
            Ok(q) => {
                metrics::counter!(crate::observability::PRICE_QUOTES_TOTAL, "stay_type" => q.stay_type.tag())
                    .increment(1);
            }
            Err(e) => debug!("price quote for {room_category_id} refused: {e}"),
        }
        result
    }
}
