//! Decimal timestamps, half-open time ranges, and conversion to chrono.
//!
//! Instants are seconds since the Unix epoch held as [`Decimal`] so that
//! sub-second precision survives every computation. Integer results
//! (indices, day counts) always use floor semantics, including for
//! instants before the epoch.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CalendarError, Result};

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 604_800;

/// A half-open interval `[start, end)` of decimal timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: Decimal,
    pub end: Decimal,
}

impl TimeRange {
    pub fn new(start: Decimal, end: Decimal) -> Self {
        TimeRange { start, end }
    }

    /// Whether `timestamp` falls inside the range (start inclusive, end exclusive).
    pub fn contains(&self, timestamp: Decimal) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    pub fn length(&self) -> Decimal {
        self.end - self.start
    }
}

// ── Checked decimal arithmetic ──────────────────────────────────────────────

pub(crate) fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| CalendarError::Overflow(format!("{a} + {b}")))
}

pub(crate) fn sub(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| CalendarError::Overflow(format!("{a} - {b}")))
}

pub(crate) fn mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| CalendarError::Overflow(format!("{a} * {b}")))
}

pub(crate) fn div(a: Decimal, b: Decimal) -> Result<Decimal> {
    if b.is_zero() {
        return Err(CalendarError::Overflow(format!("{a} / 0")));
    }
    a.checked_div(b)
        .ok_or_else(|| CalendarError::Overflow(format!("{a} / {b}")))
}

/// Floor a decimal into an `i64`.
pub(crate) fn floor_i64(value: Decimal) -> Result<i64> {
    value
        .floor()
        .to_i64()
        .ok_or_else(|| CalendarError::Overflow(format!("{value} does not fit in i64")))
}

/// `floor(a / b)` as an integer.
pub(crate) fn floor_div(a: Decimal, b: Decimal) -> Result<i64> {
    floor_i64(div(a, b)?)
}

// ── chrono conversion ───────────────────────────────────────────────────────

/// Convert a decimal timestamp to a UTC datetime, keeping nanosecond precision.
pub fn to_datetime(timestamp: Decimal) -> Result<DateTime<Utc>> {
    let secs = floor_i64(timestamp)?;
    let frac = timestamp - Decimal::from(secs);
    let nanos = (frac * Decimal::from(1_000_000_000))
        .floor()
        .to_u32()
        .unwrap_or(0);
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| CalendarError::Overflow(format!("timestamp {timestamp} out of range")))
}

/// Convert any chrono datetime back to a decimal timestamp.
pub fn from_datetime<T: TimeZone>(dt: &DateTime<T>) -> Decimal {
    let secs = Decimal::from(dt.timestamp());
    let nanos = dt.timestamp_subsec_nanos();
    if nanos == 0 {
        secs
    } else {
        secs + Decimal::from(nanos) / Decimal::from(1_000_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_range_is_half_open() {
        let range = TimeRange::new(dec!(10), dec!(20));
        assert!(range.contains(dec!(10)));
        assert!(range.contains(dec!(19.999)));
        assert!(!range.contains(dec!(20)));
        assert_eq!(range.length(), dec!(10));
    }

    #[test]
    fn test_floor_div_rounds_towards_negative_infinity() {
        assert_eq!(floor_div(dec!(-1), dec!(86400)).unwrap(), -1);
        assert_eq!(floor_div(dec!(86399.9), dec!(86400)).unwrap(), 0);
        assert_eq!(floor_div(dec!(-86400), dec!(86400)).unwrap(), -1);
    }

    #[test]
    fn test_div_by_zero_is_an_error() {
        assert!(matches!(
            div(dec!(1), Decimal::ZERO),
            Err(CalendarError::Overflow(_))
        ));
    }

    #[test]
    fn test_datetime_round_trip_keeps_subseconds() {
        let ts = dec!(1773655200.25);
        let dt = to_datetime(ts).unwrap();
        assert_eq!(dt.timestamp(), 1773655200);
        assert_eq!(dt.timestamp_subsec_millis(), 250);
        assert_eq!(from_datetime(&dt), ts);
    }

    #[test]
    fn test_pre_epoch_datetime() {
        let dt = to_datetime(dec!(-0.5)).unwrap();
        assert_eq!(dt.timestamp(), -1);
        assert_eq!(from_datetime(&dt), dec!(-0.5));
    }
}
