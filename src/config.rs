use std::path::PathBuf;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};

use crate::classifier::DurationRules;

/// Runtime configuration for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// ISO 4217 code applied when a booking request omits one.
    pub currency: String,
    pub duration_rules: DurationRules,
    /// Offset applied to timestamps that arrive without one.
    pub default_offset: FixedOffset,
    /// Journal appends between compactions.
    pub compact_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            currency: "BDT".into(),
            duration_rules: DurationRules::default(),
            default_offset: Utc.fix(),
            compact_threshold: 1000,
        }
    }
}

impl EngineConfig {
    /// Read `QAYAMGAH_*` variables, falling back to defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|s| s.trim().parse().ok())
        }

        let defaults = Self::default();
        let tolerance_secs: Option<i64> = parsed(&lookup, "QAYAMGAH_DURATION_TOLERANCE_SECS");
        let offset_secs: Option<i32> = parsed(&lookup, "QAYAMGAH_DEFAULT_UTC_OFFSET_SECS");

        Self {
            data_dir: lookup("QAYAMGAH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            currency: lookup("QAYAMGAH_CURRENCY")
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| is_currency_code(c))
                .unwrap_or(defaults.currency),
            duration_rules: DurationRules {
                tolerance_ms: tolerance_secs
                    .filter(|s| *s >= 0)
                    .map_or(defaults.duration_rules.tolerance_ms, |s| s * 1000),
                max_nights: parsed(&lookup, "QAYAMGAH_MAX_NIGHTS")
                    .filter(|n: &u32| *n >= 1)
                    .unwrap_or(defaults.duration_rules.max_nights),
            },
            default_offset: offset_secs
                .and_then(FixedOffset::east_opt)
                .unwrap_or(defaults.default_offset),
            compact_threshold: parsed(&lookup, "QAYAMGAH_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("qayamgah.wal")
    }
}

pub(crate) fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
