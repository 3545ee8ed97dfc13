//! Year layout: month groups, weekday headers and week rows of day cells.
//!
//! The layout is plain data. Turning it into text, colours or HTML is left
//! to the caller; the day cells only carry the flags a renderer needs.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::month::{self, MonthData};
use crate::registry::{CalendarRegistry, CalendarUnits};
use crate::time::{self, TimeRange};
use crate::year::{self, YearData};

/// Where "now" falls in a calendar, used to flag day cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarState {
    pub timestamp: Decimal,
    /// Whole days per week.
    pub week_length: i64,
    pub today_start: Decimal,
    pub current_week: TimeRange,
    pub current_month: TimeRange,
}

impl CalendarState {
    pub fn new(calendar: &CalendarUnits<'_>, timestamp: Decimal) -> Result<Self> {
        let units = calendar.units();
        Ok(CalendarState {
            timestamp,
            week_length: calendar.days_per_week(timestamp)?,
            today_start: calendar.day().start(units, timestamp)?,
            current_week: calendar.week().time_range(units, timestamp)?,
            current_month: calendar.month().time_range(units, timestamp)?,
        })
    }
}

/// One slot in a week row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayCell {
    Blank,
    Day {
        number: i64,
        start: Decimal,
        today: bool,
        in_current_week: bool,
        in_current_month: bool,
    },
}

impl DayCell {
    pub fn number(&self) -> Option<i64> {
        match self {
            DayCell::Blank => None,
            DayCell::Day { number, .. } => Some(*number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthHeader {
    /// 1-based position within the year.
    pub index: usize,
    pub name: Option<String>,
    pub start: Decimal,
    pub end: Decimal,
    pub first_weekday: i64,
}

/// One row of the grid: for each month in the group, `week_length` cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekRow {
    pub months: Vec<Vec<DayCell>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGroup {
    pub months: Vec<MonthHeader>,
    pub weekday_names: Vec<String>,
    pub weeks: Vec<WeekRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearLayout {
    pub calendar: String,
    pub year: YearData,
    pub state: CalendarState,
    pub groups: Vec<MonthGroup>,
}

impl YearLayout {
    /// Every day cell in display order, skipping blanks.
    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.groups
            .iter()
            .flat_map(|group| &group.weeks)
            .flat_map(|row| &row.months)
            .flatten()
            .filter(|cell| !matches!(cell, DayCell::Blank))
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Builds [`YearLayout`]s for calendars held by a registry.
#[derive(Debug)]
pub struct CalendarLayoutBuilder<'r> {
    registry: &'r CalendarRegistry,
    config: EngineConfig,
}

impl<'r> CalendarLayoutBuilder<'r> {
    pub fn new(registry: &'r CalendarRegistry, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(CalendarLayoutBuilder { registry, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lay out the year containing `timestamp`.
    ///
    /// Months are grouped `months_across` at a time; each group continues
    /// from the month after the last one the previous group showed, and the
    /// walk stops at the first empty group.
    #[tracing::instrument(skip(self))]
    pub fn build_year(&self, calendar_name: &str, timestamp: Decimal) -> Result<YearLayout> {
        let calendar = self.registry.get_calendar_units(calendar_name)?;
        let units = calendar.units();
        let state = CalendarState::new(&calendar, timestamp)?;
        let year = year::year_data(
            timestamp,
            calendar.year(),
            units,
            self.config.epoch_year,
            self.config.months_across,
        )?;
        let day_length = calendar.day().length(units, timestamp)?;
        let weekday_names = calendar.week().names(units, timestamp)?.unwrap_or_default();

        let mut groups = Vec::new();
        let mut first_month = 1;
        loop {
            let data = month::month_window(
                year.year_start,
                first_month,
                year.months_across,
                &calendar,
                timestamp,
            )?;
            if data.is_empty() {
                break;
            }
            first_month = data.next_month_index;
            groups.push(build_group(data, &weekday_names, day_length, &state)?);
        }

        tracing::debug!(
            calendar = calendar_name,
            year = year.year_num,
            groups = groups.len(),
            "built year layout"
        );

        Ok(YearLayout {
            calendar: calendar_name.to_string(),
            year,
            state,
            groups,
        })
    }
}

fn build_group(
    mut data: MonthData,
    weekday_names: &[String],
    day_length: Decimal,
    state: &CalendarState,
) -> Result<MonthGroup> {
    data.check_shape()?;
    let months = (0..data.len())
        .map(|i| MonthHeader {
            index: data.month_index[i],
            name: data.names.get(i).cloned(),
            start: data.month_start[i],
            end: data.month_end[i],
            first_weekday: data.first_weekday[i],
        })
        .collect();

    let rows = month::max_weeks_needed(&data, day_length, state.week_length)?;
    let mut weeks = Vec::with_capacity(rows);
    for _ in 0..rows {
        weeks.push(week_row(&data, day_length, state)?);
        month::advance_cursor_after_week(&mut data, day_length, state.week_length)?;
    }

    Ok(MonthGroup {
        months,
        weekday_names: weekday_names.to_vec(),
        weeks,
    })
}

fn week_row(data: &MonthData, day_length: Decimal, state: &CalendarState) -> Result<WeekRow> {
    let mut months = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        let days_in_month = data.days_in_month(i, day_length)?;
        let in_current_month = state.current_month.contains(data.month_start[i]);
        let mut cells = Vec::new();
        let mut day = data.day_cursor[i];
        for column in 0..state.week_length {
            if column < data.first_weekday[i] || day > days_in_month {
                cells.push(DayCell::Blank);
                continue;
            }
            let offset = time::mul(Decimal::from(day - 1), day_length)?;
            let start = time::add(data.month_start[i], offset)?;
            let in_current_week = in_current_month && state.current_week.contains(start);
            cells.push(DayCell::Day {
                number: day,
                start,
                today: in_current_week && start == state.today_start,
                in_current_week,
                in_current_month,
            });
            day += 1;
        }
        months.push(cells);
    }
    Ok(WeekRow { months })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CalendarDefinition, Role};
    use crate::unit::{CalendarUnit, UnitSet};
    use crate::value::{PropertyValue, Value};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    const DAY: i64 = 86_400;

    fn floor_to(length: i64) -> PropertyValue {
        PropertyValue::computed(move |env| {
            let length = Decimal::from(length);
            Ok(Value::Number((env.timestamp / length).floor() * length))
        })
    }

    /// A 28-day year split into four 7-day months, each starting on weekday 0,
    /// plus a three-day "week" to exercise short rows.
    fn registry(months: usize, week_days: i64) -> CalendarRegistry {
        let names: Vec<String> = (1..=months).map(|i| format!("M{i}")).collect();
        let units: UnitSet = [
            CalendarUnit::new("year")
                .with_length(PropertyValue::number(28 * DAY))
                .with_start(floor_to(28 * DAY))
                .with_names(PropertyValue::names(&names)),
            CalendarUnit::new("month")
                .with_length(PropertyValue::number(7 * DAY))
                .with_start(floor_to(7 * DAY)),
            CalendarUnit::new("week")
                .with_length(PropertyValue::number(week_days * DAY))
                .with_start(floor_to(week_days * DAY))
                .with_names(PropertyValue::names(&["A", "B", "C", "D", "E", "F", "G"][..week_days as usize])),
            CalendarUnit::new("day")
                .with_length(PropertyValue::number(DAY))
                .with_start(floor_to(DAY)),
        ]
        .into_iter()
        .collect();
        let mut registry = CalendarRegistry::new();
        registry.initialize(
            units,
            BTreeMap::from([(
                "small".to_string(),
                CalendarDefinition::new()
                    .with_unit(Role::Year, "year")
                    .with_unit(Role::Month, "month")
                    .with_unit(Role::Week, "week")
                    .with_unit(Role::Day, "day"),
            )]),
        );
        registry
    }

    #[test]
    fn test_year_is_split_into_groups() {
        let registry = registry(4, 7);
        let builder =
            CalendarLayoutBuilder::new(&registry, EngineConfig::default().with_months_across(3)).unwrap();
        let layout = builder.build_year("small", dec!(0)).unwrap();

        assert_eq!(layout.groups.len(), 2);
        let indices: Vec<Vec<usize>> = layout
            .groups
            .iter()
            .map(|g| g.months.iter().map(|m| m.index).collect())
            .collect();
        assert_eq!(indices, vec![vec![1, 2, 3], vec![4]]);
        assert_eq!(layout.groups[0].months[1].name.as_deref(), Some("M2"));
        assert_eq!(layout.groups[0].weekday_names.len(), 7);
        assert_eq!(layout.days().count(), 28);
    }

    #[test]
    fn test_rows_have_week_length_cells() {
        let registry = registry(4, 7);
        let builder = CalendarLayoutBuilder::new(&registry, EngineConfig::default()).unwrap();
        let layout = builder.build_year("small", dec!(0)).unwrap();

        let group = &layout.groups[0];
        // Each 7-day month starts on weekday 0 and fits in one row.
        assert_eq!(group.weeks.len(), 1);
        for cells in &group.weeks[0].months {
            assert_eq!(cells.len(), 7);
            let numbers: Vec<i64> = cells.iter().filter_map(DayCell::number).collect();
            assert_eq!(numbers, (1..=7).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_leading_blanks_follow_first_weekday() {
        // Three-day weeks: month 2 starts on day 7, weekday 1.
        let registry = registry(4, 3);
        let builder = CalendarLayoutBuilder::new(&registry, EngineConfig::default()).unwrap();
        let layout = builder.build_year("small", dec!(0)).unwrap();

        let month_two = &layout.groups[0];
        assert_eq!(month_two.months[1].first_weekday, 1);
        // Month 1: 7 days → 3 rows; month 2: 7 + 1 → 3 rows; month 3: 7 + 2 → 3 rows.
        assert_eq!(month_two.weeks.len(), 3);
        let first_row = &month_two.weeks[0].months[1];
        assert_eq!(first_row[0], DayCell::Blank);
        assert_eq!(first_row[1].number(), Some(1));
        let last_row = &month_two.weeks[2].months[1];
        let numbers: Vec<i64> = last_row.iter().filter_map(DayCell::number).collect();
        assert_eq!(numbers, vec![6, 7]);
    }

    #[test]
    fn test_today_and_current_week_flags() {
        let registry = registry(4, 7);
        let builder = CalendarLayoutBuilder::new(&registry, EngineConfig::default()).unwrap();
        // Noon on day 10: month 2, its week, day 3 of that month.
        let now = Decimal::from(9 * DAY + DAY / 2);
        let layout = builder.build_year("small", now).unwrap();

        assert_eq!(layout.state.today_start, Decimal::from(9 * DAY));
        let today: Vec<&DayCell> = layout
            .days()
            .filter(|cell| matches!(cell, DayCell::Day { today: true, .. }))
            .collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].number(), Some(3));

        let current_week = layout
            .days()
            .filter(|cell| matches!(cell, DayCell::Day { in_current_week: true, .. }))
            .count();
        assert_eq!(current_week, 7);
        let current_month = layout
            .days()
            .filter(|cell| matches!(cell, DayCell::Day { in_current_month: true, .. }))
            .count();
        assert_eq!(current_month, 7);
    }

    #[test]
    fn test_unknown_calendar_fails() {
        let registry = registry(4, 7);
        let builder = CalendarLayoutBuilder::new(&registry, EngineConfig::default()).unwrap();
        assert!(builder.build_year("missing", dec!(0)).is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let registry = registry(4, 7);
        assert!(CalendarLayoutBuilder::new(&registry, EngineConfig::default().with_months_across(0)).is_err());
    }

    #[test]
    fn test_layout_serializes_cells_with_kind_tag() {
        let registry = registry(4, 7);
        let builder = CalendarLayoutBuilder::new(&registry, EngineConfig::default()).unwrap();
        let layout = builder.build_year("small", dec!(0)).unwrap();
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["groups"][0]["weeks"][0]["months"][0][0]["kind"], "day");
        assert_eq!(json["year"]["year_num"], 1970);
    }
}
