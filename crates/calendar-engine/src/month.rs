//! Month windows: which months a layout group shows, where they start and
//! end, and how the day cursor walks through them one week row at a time.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CalendarError, Result};
use crate::registry::CalendarUnits;
use crate::time;
use crate::value::Value;

/// Per-month data for one group of side-by-side months.
///
/// All vectors have the same length, one entry per month in the group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthData {
    /// 1-based day number the next week row starts at.
    pub day_cursor: Vec<i64>,
    pub month_start: Vec<Decimal>,
    /// Last second of the month, clamped to the year end.
    pub month_end: Vec<Decimal>,
    /// Weekday of the month's first day. Reset to 0 after the first row.
    pub first_weekday: Vec<i64>,
    /// 1-based index of each month within the year.
    pub month_index: Vec<usize>,
    /// Month names, when the year unit supplies them.
    pub names: Vec<String>,
    /// Index the next group should start from.
    pub next_month_index: usize,
}

impl MonthData {
    fn empty(next_month_index: usize) -> Self {
        MonthData {
            day_cursor: Vec::new(),
            month_start: Vec::new(),
            month_end: Vec::new(),
            first_weekday: Vec::new(),
            month_index: Vec::new(),
            names: Vec::new(),
            next_month_index,
        }
    }

    pub fn len(&self) -> usize {
        self.month_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.month_start.is_empty()
    }

    /// Fails unless every per-month vector has one entry per month.
    /// `names` may also be empty.
    pub fn check_shape(&self) -> Result<()> {
        let len = self.len();
        let lengths = [
            ("day_cursor", self.day_cursor.len()),
            ("month_end", self.month_end.len()),
            ("first_weekday", self.first_weekday.len()),
            ("month_index", self.month_index.len()),
        ];
        if let Some((field, found)) = lengths.into_iter().find(|(_, n)| *n != len) {
            return Err(CalendarError::InvalidConfiguration(format!(
                "month data has {len} months but {found} {field} entries"
            )));
        }
        if !self.names.is_empty() && self.names.len() != len {
            return Err(CalendarError::InvalidConfiguration(format!(
                "month data has {len} months but {} names",
                self.names.len()
            )));
        }
        Ok(())
    }

    /// Whole days in month `i`, never less than 1.
    pub fn days_in_month(&self, i: usize, day_length: Decimal) -> Result<i64> {
        self.check_shape()?;
        let (Some(start), Some(end)) = (self.month_start.get(i), self.month_end.get(i)) else {
            return Err(CalendarError::InvalidConfiguration(format!(
                "month {i} is outside a group of {}",
                self.len()
            )));
        };
        let span = time::sub(*end, *start)?;
        Ok((time::floor_div(span, day_length)? + 1).max(1))
    }

    /// True once every month's cursor has run past its last day.
    pub fn is_exhausted(&self, day_length: Decimal) -> Result<bool> {
        self.check_shape()?;
        for i in 0..self.len() {
            if self.day_cursor[i] <= self.days_in_month(i, day_length)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Collect up to `months_across` months starting at 1-based
/// `first_month_index`.
///
/// The walk starts at `year_start` and steps one resolved month length at a
/// time; each month unit length is evaluated with the month index as its
/// first argument. Months that resolve to a length ≤ 0 are skipped without
/// moving the cursor. The walk stops at the year end, at the last month
/// name of the year unit, or once enough months are collected.
///
/// # Errors
///
/// - [`CalendarError::MalformedDefinition`] when the year unit has no month names
/// - [`CalendarError::InvalidConfiguration`] for a zero `first_month_index`
pub fn month_window(
    year_start: Decimal,
    first_month_index: usize,
    months_across: usize,
    calendar: &CalendarUnits<'_>,
    timestamp: Decimal,
) -> Result<MonthData> {
    if first_month_index == 0 {
        return Err(CalendarError::InvalidConfiguration(
            "month indices start at 1".to_string(),
        ));
    }

    let units = calendar.units();
    let year = calendar.year();
    let month = calendar.month();

    let month_names = year
        .names(units, timestamp)?
        .ok_or_else(|| CalendarError::MalformedDefinition {
            unit: year.name().to_string(),
            reason: "year unit must list its month names".to_string(),
        })?;
    let max_months = month_names.len();
    let year_end = time::add(year_start, year.length(units, timestamp)?)?;
    let per_week = calendar.days_per_week(timestamp)?;

    let month_length = |cursor: Decimal, index: usize| -> Result<Decimal> {
        month.length_with(units, cursor, &[Value::from(index as i64)])
    };

    tracing::debug!(%year_start, %year_end, first_month_index, months_across, "building month window");

    let mut cursor = year_start;
    let mut index = 1;
    while index < first_month_index && index <= max_months {
        let length = month_length(cursor, index)?;
        if length > Decimal::ZERO {
            cursor = time::add(cursor, length)?;
        }
        index += 1;
    }

    let mut data = MonthData::empty(first_month_index);
    while data.len() < months_across && cursor < year_end && index <= max_months {
        let length = month_length(cursor, index)?;
        if length <= Decimal::ZERO {
            tracing::trace!(month = index, %length, "skipping zero-length month");
            index += 1;
            continue;
        }

        let start = cursor;
        let last = time::sub(time::add(start, length)?, Decimal::ONE)?;
        let end = last.min(time::sub(year_end, Decimal::ONE)?);
        let first_weekday = calendar.day_of_week(start)?.rem_euclid(per_week);
        tracing::trace!(month = index, %start, %end, first_weekday, "month in window");

        data.day_cursor.push(1);
        data.month_start.push(start);
        data.month_end.push(end);
        data.first_weekday.push(first_weekday);
        data.month_index.push(index);
        if let Some(name) = month_names.get(index - 1) {
            data.names.push(name.clone());
        }

        cursor = time::add(cursor, length)?;
        index += 1;
    }
    data.next_month_index = index;

    Ok(data)
}

/// Number of week rows needed to show every month in the group.
///
/// Each month needs `ceil((days_in_month + first_weekday) / days_per_week)`
/// rows; the group needs the largest of those, or 0 when it is empty.
pub fn max_weeks_needed(data: &MonthData, day_length: Decimal, days_per_week: i64) -> Result<usize> {
    if days_per_week <= 0 {
        return Err(CalendarError::InvalidConfiguration(format!(
            "days per week must be positive, got {days_per_week}"
        )));
    }
    data.check_shape()?;

    let mut weeks = 0;
    for i in 0..data.len() {
        let days = data.days_in_month(i, day_length)? + data.first_weekday[i];
        let needed = (days + days_per_week - 1) / days_per_week;
        weeks = weeks.max(needed as usize);
    }
    Ok(weeks)
}

/// Move every month's cursor past the week row just emitted.
///
/// On the first row a month only fills `days_per_week - first_weekday`
/// cells; afterwards it fills a whole week. Cursors never pass
/// `days_in_month + 1`, and `first_weekday` is 0 from here on.
pub fn advance_cursor_after_week(data: &mut MonthData, day_length: Decimal, days_per_week: i64) -> Result<()> {
    data.check_shape()?;
    for i in 0..data.len() {
        let days = data.days_in_month(i, day_length)?;
        let filled = days_per_week - data.first_weekday[i];
        data.day_cursor[i] = (data.day_cursor[i] + filled).min(days + 1);
        data.first_weekday[i] = 0;
    }
    Ok(())
}
