//! Parsers for recurrence inputs: intervals, times of day and weekday names.

use chrono::{NaiveTime, Timelike, Weekday};
use rust_decimal::Decimal;

use crate::error::{CalendarError, Result};
use crate::time::{SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_WEEK};

/// Seconds per unit for an interval unit word, or `None` if unknown.
fn unit_seconds(unit: &str) -> Option<i64> {
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(SECONDS_PER_MINUTE),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(SECONDS_PER_HOUR),
        "d" | "day" | "days" => Some(SECONDS_PER_DAY),
        "w" | "wk" | "wks" | "week" | "weeks" => Some(SECONDS_PER_WEEK),
        _ => None,
    }
}

/// Parse an interval into seconds.
///
/// Accepts compact forms (`"2h"`, `"1h30m"`, `"1.5d"`, `"1w2d"`) and spelled
/// forms (`"2 hours"`, `"1 hour 30 minutes"`). Every number needs a unit;
/// the total must be positive.
pub fn parse_interval(s: &str) -> Result<Decimal> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(CalendarError::InvalidDuration("empty interval".to_string()));
    }

    let mut total = Decimal::ZERO;
    let mut chars = s.chars().peekable();
    let mut found_any = false;

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        let Some(&first) = chars.peek() else { break };

        let mut num_buf = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            num_buf.push(c);
        }
        if num_buf.is_empty() {
            return Err(CalendarError::InvalidDuration(format!(
                "expected number before '{first}' in '{s}'"
            )));
        }
        let n: Decimal = num_buf
            .parse()
            .map_err(|_| CalendarError::InvalidDuration(format!("invalid number in '{s}'")))?;

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut unit = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_alphabetic()) {
            unit.push(c);
        }
        if unit.is_empty() {
            return Err(CalendarError::InvalidDuration(format!(
                "number without unit in '{s}'"
            )));
        }
        let per_unit = unit_seconds(&unit).ok_or_else(|| {
            CalendarError::InvalidDuration(format!("unknown unit '{unit}' in '{s}'"))
        })?;

        let seconds = n
            .checked_mul(Decimal::from(per_unit))
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| CalendarError::InvalidDuration(format!("interval too large: '{s}'")))?;
        total = seconds;
        found_any = true;
    }

    if !found_any {
        return Err(CalendarError::InvalidDuration(format!(
            "no valid components in '{s}'"
        )));
    }
    if total <= Decimal::ZERO {
        return Err(CalendarError::InvalidDuration(format!(
            "interval must be positive: '{s}'"
        )));
    }
    Ok(total.normalize())
}

/// Parse a 24-hour time of day: `"9:00"`, `"09:00"` or `"14:30:15"`.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let trimmed = s.trim();
    let parts: Vec<&str> = trimmed.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(CalendarError::InvalidTime(format!(
            "expected HH:MM or HH:MM:SS, got '{trimmed}'"
        )));
    }

    let field = |part: &str| -> Result<u32> {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CalendarError::InvalidTime(format!("bad field '{part}' in '{trimmed}'")));
        }
        part.parse()
            .map_err(|_| CalendarError::InvalidTime(format!("bad field '{part}' in '{trimmed}'")))
    };

    let hour = field(parts[0])?;
    let minute = field(parts[1])?;
    let second = match parts.get(2) {
        Some(part) => field(part)?,
        None => 0,
    };
    if parts[1].len() != 2 {
        return Err(CalendarError::InvalidTime(format!(
            "minutes need two digits in '{trimmed}'"
        )));
    }

    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| CalendarError::InvalidTime(format!("out of range: '{trimmed}'")))
}

/// Parse a weekday name (case-insensitive, full or abbreviated).
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    match s.trim().to_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" | "thurs" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        _ => Err(CalendarError::InvalidWeekday(s.to_string())),
    }
}

/// Lowercase full name of a weekday.
pub(crate) fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// `HH:MM`, with `:SS` only when the seconds are non-zero.
pub(crate) fn format_time(t: NaiveTime) -> String {
    if t.second() == 0 {
        t.format("%H:%M").to_string()
    } else {
        t.format("%H:%M:%S").to_string()
    }
}
