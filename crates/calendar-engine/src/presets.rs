//! Ready-made calendar definitions built from computed properties.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::{CalendarError, Result};
use crate::registry::{CalendarDefinition, Role};
use crate::time::{self, SECONDS_PER_DAY, SECONDS_PER_WEEK};
use crate::unit::{CalendarUnit, UnitSet};
use crate::value::{Environment, PropertyValue, Value};

pub const GREGORIAN_YEAR: &str = "gregorian_year";
pub const GREGORIAN_MONTH: &str = "gregorian_month";
pub const GREGORIAN_WEEK: &str = "gregorian_week";
pub const GREGORIAN_DAY: &str = "gregorian_day";

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

/// The Gregorian calendar at a fixed UTC offset, Monday-first weeks.
///
/// Every start and every month/year length is a computed property, so the
/// same engine code that handles invented calendars handles leap years and
/// 28–31 day months. The month length reads an optional month index
/// argument (1-based, within the year of the timestamp).
pub fn gregorian(tz_offset_seconds: i64) -> (UnitSet, CalendarDefinition) {
    let tz = Decimal::from(tz_offset_seconds);

    let day = CalendarUnit::new(GREGORIAN_DAY)
        .with_length(PropertyValue::number(SECONDS_PER_DAY))
        .with_timezone(PropertyValue::number(tz))
        .with_start(PropertyValue::computed(move |env| {
            let date = local_date(env.timestamp, tz)?;
            Ok(Value::Number(utc_start(date, tz)?))
        }));

    // 1970-01-05 was a Monday: four days after the epoch.
    let week = CalendarUnit::new(GREGORIAN_WEEK)
        .with_length(PropertyValue::number(SECONDS_PER_WEEK))
        .with_offset(4)
        .with_names(PropertyValue::names(&WEEKDAY_NAMES))
        .with_start(PropertyValue::computed(move |env| {
            let date = local_date(env.timestamp, tz)?;
            let back = u64::from(date.weekday().num_days_from_monday());
            let monday = date
                .checked_sub_days(chrono::Days::new(back))
                .ok_or_else(|| out_of_range(env))?;
            Ok(Value::Number(utc_start(monday, tz)?))
        }));

    let month = CalendarUnit::new(GREGORIAN_MONTH)
        .with_length(PropertyValue::computed(move |env| {
            let date = local_date(env.timestamp, tz)?;
            let month = match env.arg(0) {
                Some(_) => month_arg(env)?,
                None => date.month(),
            };
            let first = NaiveDate::from_ymd_opt(date.year(), month, 1).ok_or_else(|| out_of_range(env))?;
            Ok(Value::Number(Decimal::from(days_in_month(first)? * SECONDS_PER_DAY)))
        }))
        .with_start(PropertyValue::computed(move |env| {
            let date = local_date(env.timestamp, tz)?;
            let first = date.with_day(1).ok_or_else(|| out_of_range(env))?;
            Ok(Value::Number(utc_start(first, tz)?))
        }));

    let year = CalendarUnit::new(GREGORIAN_YEAR)
        .with_names(PropertyValue::names(&MONTH_NAMES))
        .with_length(PropertyValue::computed(move |env| {
            let date = local_date(env.timestamp, tz)?;
            let first = NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or_else(|| out_of_range(env))?;
            let next = NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).ok_or_else(|| out_of_range(env))?;
            Ok(Value::Number(Decimal::from((next - first).num_days() * SECONDS_PER_DAY)))
        }))
        .with_start(PropertyValue::computed(move |env| {
            let date = local_date(env.timestamp, tz)?;
            let first = NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or_else(|| out_of_range(env))?;
            Ok(Value::Number(utc_start(first, tz)?))
        }));

    let units: UnitSet = [year, month, week, day].into_iter().collect();
    let definition = CalendarDefinition::new()
        .with_unit(Role::Year, GREGORIAN_YEAR)
        .with_unit(Role::Month, GREGORIAN_MONTH)
        .with_unit(Role::Week, GREGORIAN_WEEK)
        .with_unit(Role::Day, GREGORIAN_DAY);
    (units, definition)
}

/// Local calendar date of `timestamp` at offset `tz`.
fn local_date(timestamp: Decimal, tz: Decimal) -> Result<NaiveDate> {
    Ok(time::to_datetime(time::add(timestamp, tz)?)?.date_naive())
}

/// Timestamp of local midnight on `date` at offset `tz`.
fn utc_start(date: NaiveDate, tz: Decimal) -> Result<Decimal> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CalendarError::Overflow(format!("midnight of {date}")))?;
    time::sub(time::from_datetime(&Utc.from_utc_datetime(&midnight)), tz)
}

fn days_in_month(first: NaiveDate) -> Result<i64> {
    let next = first
        .checked_add_months(chrono::Months::new(1))
        .ok_or_else(|| CalendarError::Overflow(format!("month after {first}")))?;
    Ok((next - first).num_days())
}

fn month_arg(env: &Environment<'_>) -> Result<u32> {
    let index = time::floor_i64(env.number_arg(0)?)?;
    u32::try_from(index)
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| CalendarError::Expression(format!("month index {index} out of range")))
}

fn out_of_range(env: &Environment<'_>) -> CalendarError {
    CalendarError::Expression(format!(
        "{}: timestamp {} is outside the Gregorian range",
        env.unit.name(),
        env.timestamp
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::layout::{CalendarLayoutBuilder, DayCell};
    use crate::registry::CalendarRegistry;
    use crate::year;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    /// 2026-03-16 00:00:00 UTC, a Monday.
    const MONDAY: i64 = 1_773_619_200;

    fn monday() -> Decimal {
        Decimal::from(MONDAY)
    }

    fn registry(tz: i64) -> CalendarRegistry {
        let (units, definition) = gregorian(tz);
        let mut registry = CalendarRegistry::new();
        registry.initialize(units, BTreeMap::from([("greg".to_string(), definition)]));
        registry
    }

    #[test]
    fn test_day_and_week_starts() {
        let registry = registry(0);
        let calendar = registry.get_calendar_units("greg").unwrap();
        let units = calendar.units();
        let noon_wednesday = monday() + dec!(2) * dec!(86400) + dec!(43200);

        assert_eq!(
            calendar.day().start(units, noon_wednesday).unwrap(),
            monday() + dec!(172800)
        );
        assert_eq!(calendar.week().start(units, noon_wednesday).unwrap(), monday());
        assert_eq!(calendar.day_of_week(noon_wednesday).unwrap(), 2);
        assert_eq!(calendar.day_of_week(monday()).unwrap(), 0);
    }

    #[test]
    fn test_month_lengths_follow_leap_years() {
        let registry = registry(0);
        let calendar = registry.get_calendar_units("greg").unwrap();
        let units = calendar.units();
        let month = calendar.month();
        // 2024-01-01
        let jan_2024 = dec!(1704067200);
        let days = |ts: Decimal, index: i64| {
            month.length_with(units, ts, &[Value::from(index)]).unwrap() / dec!(86400)
        };
        assert_eq!(days(jan_2024, 2), dec!(29));
        assert_eq!(days(monday(), 2), dec!(28));
        assert_eq!(days(monday(), 4), dec!(30));
        assert_eq!(days(monday(), 12), dec!(31));
        assert_eq!(month.length(units, monday()).unwrap(), dec!(2678400));
        assert!(month.length_with(units, monday(), &[Value::from(13)]).is_err());
    }

    #[test]
    fn test_year_data_and_month_index() {
        let registry = registry(0);
        let calendar = registry.get_calendar_units("greg").unwrap();
        let units = calendar.units();

        let data = year::year_data(monday(), calendar.year(), units, 1970, 3).unwrap();
        assert_eq!(data.year_num, 2026);
        assert_eq!(data.year_start, dec!(1767225600));
        assert_eq!(data.year_length, dec!(31536000));

        // Mid-June 2024 (leap year) falls in the sixth name slot.
        let june_2024 = dec!(1718409600);
        assert_eq!(calendar.year().calculate_index(units, june_2024).unwrap(), 5);
    }

    #[test]
    fn test_timezone_offset_moves_day_start() {
        // UTC+2: Monday 00:00 UTC is already 02:00 local, so the day began at 22:00 UTC.
        let registry = registry(7200);
        let calendar = registry.get_calendar_units("greg").unwrap();
        let units = calendar.units();
        assert_eq!(calendar.day().start(units, monday()).unwrap(), monday() - dec!(7200));
        assert_eq!(calendar.day_of_week(monday()).unwrap(), 0);
        assert_eq!(calendar.day_of_week(monday() - dec!(3600)).unwrap(), 0);
        assert_eq!(calendar.day_of_week(monday() - dec!(7201)).unwrap(), 6);
    }

    #[test]
    fn test_year_layout() {
        let registry = registry(0);
        let builder = CalendarLayoutBuilder::new(&registry, EngineConfig::default()).unwrap();
        let layout = builder.build_year("greg", monday()).unwrap();

        assert_eq!(layout.groups.len(), 4);
        assert_eq!(layout.days().count(), 365);

        let first = &layout.groups[0];
        let names: Vec<_> = first.months.iter().filter_map(|m| m.name.as_deref()).collect();
        assert_eq!(names, vec!["January", "February", "March"]);
        assert_eq!(first.weekday_names[0], "Monday");
        // January 2026 starts on a Thursday; March on a Sunday.
        assert_eq!(first.months[0].first_weekday, 3);
        assert_eq!(first.months[2].first_weekday, 6);
        // March needs six rows: 31 days after six leading blanks.
        assert_eq!(first.weeks.len(), 6);

        let today: Vec<_> = layout
            .days()
            .filter_map(|cell| match cell {
                DayCell::Day { today: true, number, .. } => Some(*number),
                _ => None,
            })
            .collect();
        assert_eq!(today, vec![16]);
    }
}
