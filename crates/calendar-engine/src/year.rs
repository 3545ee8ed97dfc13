//! Year number, start and length for a timestamp.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CalendarError, Result};
use crate::time;
use crate::unit::{CalendarUnit, UnitSet};

/// Year-level data for one layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearData {
    pub year_num: i64,
    pub year_start: Decimal,
    pub year_length: Decimal,
    /// How many months a layout places side by side.
    pub months_across: usize,
    /// The year number counted from at timestamp 0.
    pub epoch_year: i64,
}

impl YearData {
    pub fn year_end(&self) -> Result<Decimal> {
        time::add(self.year_start, self.year_length)
    }
}

/// Derive [`YearData`] for `timestamp` from a year unit.
///
/// `year_num = epoch_year + floor(timestamp / year_length)`: the number is
/// counted in whole year lengths from timestamp 0, which is what lets
/// non-terrestrial calendars pick their own `epoch_year`.
///
/// # Errors
///
/// Returns [`CalendarError::InvalidConfiguration`] if the year length is not
/// positive, or a type mismatch if start/length are not numeric.
pub fn year_data(
    timestamp: Decimal,
    year_unit: &CalendarUnit,
    units: &UnitSet,
    epoch_year: i64,
    months_across: usize,
) -> Result<YearData> {
    let year_start = year_unit.start(units, timestamp)?;
    let year_length = year_unit.length(units, timestamp)?;
    if year_length <= Decimal::ZERO {
        return Err(CalendarError::InvalidConfiguration(format!(
            "year unit {} must have a positive length, got {year_length}",
            year_unit.name()
        )));
    }

    let years_since_epoch = time::floor_div(timestamp, year_length)?;
    let year_num = epoch_year
        .checked_add(years_since_epoch)
        .ok_or_else(|| CalendarError::Overflow(format!("{epoch_year} + {years_since_epoch}")))?;

    tracing::debug!(year_num, %year_start, %year_length, "calculated year data");

    Ok(YearData {
        year_num,
        year_start,
        year_length,
        months_across,
        epoch_year,
    })
}
