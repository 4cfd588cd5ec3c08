//! Message store timestamp decoding.
//!
//! Send times are counted from 2001-01-01 00:00:00 rather than the Unix
//! epoch. Older stores write whole seconds, newer ones nanoseconds; the two are
//! told apart by magnitude.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

/// Raw values above this are nanoseconds
pub const NANOSECOND_THRESHOLD: i64 = 1_000_000_000_000;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Format used for decoded timestamps in the export
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Years that render as a four-digit calendar date
const CALENDAR_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Reference instant of the store's clock
#[must_use]
pub fn reference_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// A send time as shown in the export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedTimestamp {
    /// Decoded calendar time
    Calendar(NaiveDateTime),
    /// Value that could not be decoded, shown verbatim
    Raw(i64),
}

impl DecodedTimestamp {
    /// True when decoding fell back to the raw value
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

impl fmt::Display for DecodedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calendar(at) => write!(f, "{}", at.format(DISPLAY_FORMAT)),
            Self::Raw(raw) => write!(f, "{raw}"),
        }
    }
}

/// Decode a raw store timestamp. Never fails; out-of-range values come back
/// as [`DecodedTimestamp::Raw`].
#[must_use]
pub fn decode(raw: i64) -> DecodedTimestamp {
    offset_from_reference(raw)
        .and_then(|offset| reference_epoch().checked_add_signed(offset))
        .filter(|at| CALENDAR_YEARS.contains(&at.year()))
        .map_or(DecodedTimestamp::Raw(raw), DecodedTimestamp::Calendar)
}

fn offset_from_reference(raw: i64) -> Option<TimeDelta> {
    if raw > NANOSECOND_THRESHOLD {
        let seconds = raw.div_euclid(NANOS_PER_SECOND);
        let nanos = u32::try_from(raw.rem_euclid(NANOS_PER_SECOND)).ok()?;
        TimeDelta::new(seconds, nanos)
    } else {
        TimeDelta::try_seconds(raw)
    }
}
