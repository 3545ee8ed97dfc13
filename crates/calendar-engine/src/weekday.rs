//! Day-of-week arithmetic over arbitrary week and day units.

use std::sync::{Arc, OnceLock};

use rust_decimal::Decimal;

use crate::error::{CalendarError, Result};
use crate::time;
use crate::unit::{CalendarUnit, UnitSet};
use crate::value::{Environment, Evaluator, ExpressionHandle, Scope, Value};

/// Number of whole day units in one week unit at `timestamp`.
///
/// Non-integer ratios are floored.
pub fn days_per_week(
    week_unit: &CalendarUnit,
    day_unit: &CalendarUnit,
    units: &UnitSet,
    timestamp: Decimal,
) -> Result<i64> {
    let day_length = positive_length(day_unit, units, timestamp)?;
    let week_length = week_unit.length(units, timestamp)?;
    let days = time::floor_div(week_length, day_length)?;
    if days <= 0 {
        return Err(CalendarError::InvalidConfiguration(format!(
            "week unit {} is shorter than day unit {}",
            week_unit.name(),
            day_unit.name()
        )));
    }
    Ok(days)
}

fn positive_length(unit: &CalendarUnit, units: &UnitSet, timestamp: Decimal) -> Result<Decimal> {
    let length = unit.length(units, timestamp)?;
    if length <= Decimal::ZERO {
        return Err(CalendarError::InvalidConfiguration(format!(
            "unit {} must have a positive length, got {length}",
            unit.name()
        )));
    }
    Ok(length)
}

/// Weekday index of `timestamp`, always in `[0, days_per_week)`.
///
/// The reference instant is the epoch shifted forward by `week_unit.offset`
/// days and back by the day unit's timezone offset, so `offset` selects the
/// weekday that counts as 0.
///
/// # Examples
///
/// ```
/// use calendar_engine::{day_of_week, CalendarUnit, PropertyValue, UnitSet};
/// use rust_decimal::Decimal;
///
/// let units: UnitSet = [
///     CalendarUnit::new("day").with_length(PropertyValue::number(86_400)),
///     // 1970-01-05 was a Monday: offset 4 makes Monday weekday 0.
///     CalendarUnit::new("week")
///         .with_length(PropertyValue::number(604_800))
///         .with_offset(4),
/// ]
/// .into_iter()
/// .collect();
/// let week = units.get("week").unwrap();
/// let day = units.get("day").unwrap();
/// // 1970-01-01 was a Thursday.
/// assert_eq!(day_of_week(Decimal::ZERO, week, day, &units).unwrap(), 3);
/// ```
pub fn day_of_week(
    timestamp: Decimal,
    week_unit: &CalendarUnit,
    day_unit: &CalendarUnit,
    units: &UnitSet,
) -> Result<i64> {
    let day_length = positive_length(day_unit, units, timestamp)?;
    let per_week = days_per_week(week_unit, day_unit, units, timestamp)?;
    let timezone = day_unit.timezone(units, timestamp)?;

    let shift = time::mul(Decimal::from(week_unit.offset()), day_length)?;
    let reference = time::sub(shift, timezone)?;
    let days_elapsed = time::floor_div(time::sub(timestamp, reference)?, day_length)?;

    Ok(days_elapsed.rem_euclid(per_week))
}

// ── DayOfWeekCalculator ─────────────────────────────────────────────────────

/// Weekday calculation for one calendar, honouring a custom rule if the
/// calendar defines one.
///
/// A custom rule is compiled once and then evaluated with the day unit as
/// the current unit. Its result is trusted as-is: no range check is applied,
/// so calendars may define weeks of any shape.
pub struct DayOfWeekCalculator {
    custom_rule: Option<ExpressionHandle>,
    compiled: OnceLock<Arc<dyn Evaluator>>,
}

impl DayOfWeekCalculator {
    pub fn new(custom_rule: Option<ExpressionHandle>) -> Self {
        DayOfWeekCalculator {
            custom_rule,
            compiled: OnceLock::new(),
        }
    }

    pub fn has_custom_rule(&self) -> bool {
        self.custom_rule.is_some()
    }

    pub fn calculate(
        &self,
        timestamp: Decimal,
        week_unit: &CalendarUnit,
        day_unit: &CalendarUnit,
        units: &UnitSet,
    ) -> Result<i64> {
        let Some(rule) = &self.custom_rule else {
            return day_of_week(timestamp, week_unit, day_unit, units);
        };

        let evaluator = match self.compiled.get() {
            Some(evaluator) => Arc::clone(evaluator),
            None => {
                let scope = Scope {
                    unit: day_unit.name(),
                    siblings: units.names().collect(),
                };
                let evaluator = rule.compile(&scope)?;
                Arc::clone(self.compiled.get_or_init(|| evaluator))
            }
        };

        let env = Environment {
            unit: day_unit,
            units,
            timestamp,
            args: &[],
        };
        match evaluator.evaluate(&env)? {
            Value::Number(n) => time::floor_i64(n),
            Value::Text(s) => s
                .trim()
                .parse::<Decimal>()
                .map_err(|_| CalendarError::TypeMismatch {
                    unit: day_unit.name().to_string(),
                    property: "day_of_week".to_string(),
                    expected: "number",
                    found: format!("text {s:?}"),
                })
                .and_then(time::floor_i64),
            other => Err(CalendarError::TypeMismatch {
                unit: day_unit.name().to_string(),
                property: "day_of_week".to_string(),
                expected: "number",
                found: other.describe(),
            }),
        }
    }
}

impl std::fmt::Debug for DayOfWeekCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayOfWeekCalculator")
            .field("custom_rule", &self.custom_rule.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{from_fn, PropertyValue};
    use rust_decimal_macros::dec;

    fn week_and_day(offset: i64, timezone: i64) -> UnitSet {
        [
            CalendarUnit::new("day")
                .with_length(PropertyValue::number(86400))
                .with_timezone(PropertyValue::number(timezone)),
            CalendarUnit::new("week")
                .with_length(PropertyValue::number(604800))
                .with_offset(offset),
        ]
        .into_iter()
        .collect()
    }

    fn dow(units: &UnitSet, ts: Decimal) -> i64 {
        day_of_week(ts, units.get("week").unwrap(), units.get("day").unwrap(), units).unwrap()
    }

    #[test]
    fn test_epoch_is_thursday_with_monday_start() {
        let units = week_and_day(4, 0);
        assert_eq!(dow(&units, dec!(0)), 3);
        // 2026-03-16 is a Monday.
        assert_eq!(dow(&units, dec!(1773619200)), 0);
        assert_eq!(dow(&units, dec!(1773619200) + dec!(86399.999)), 0);
        assert_eq!(dow(&units, dec!(1773619200) + dec!(86400)), 1);
    }

    #[test]
    fn test_pre_epoch_is_never_negative() {
        let units = week_and_day(4, 0);
        // 1969-12-31 was a Wednesday.
        assert_eq!(dow(&units, dec!(-1)), 2);
        assert_eq!(dow(&units, dec!(-86400)), 2);
        assert_eq!(dow(&units, dec!(-86401)), 1);
    }

    #[test]
    fn test_offset_changes_week_start() {
        // Offset 3 puts Sunday 1970-01-04 at weekday 0.
        let units = week_and_day(3, 0);
        assert_eq!(dow(&units, dec!(0)), 4);
    }

    #[test]
    fn test_timezone_moves_day_boundary() {
        // UTC+2: 23:00 UTC on Thursday is already Friday locally.
        let units = week_and_day(4, 7200);
        assert_eq!(dow(&units, dec!(82800)), 4);
        assert_eq!(dow(&units, dec!(3600)), 3);
    }

    #[test]
    fn test_week_shorter_than_day_is_rejected() {
        let units: UnitSet = [
            CalendarUnit::new("day").with_length(PropertyValue::number(86400)),
            CalendarUnit::new("week").with_length(PropertyValue::number(3600)),
        ]
        .into_iter()
        .collect();
        let err = day_of_week(
            dec!(0),
            units.get("week").unwrap(),
            units.get("day").unwrap(),
            &units,
        )
        .unwrap_err();
        assert!(matches!(err, CalendarError::InvalidConfiguration(_)), "got: {err}");
    }

    #[test]
    fn test_custom_rule_is_trusted() {
        let units = week_and_day(4, 0);
        let calculator = DayOfWeekCalculator::new(Some(from_fn(|env| {
            // A ten-day week counted straight from the epoch.
            let day = env.unit.length(env.units, env.timestamp)?;
            Ok(Value::Number((env.timestamp / day).floor() % dec!(10)))
        })));
        assert!(calculator.has_custom_rule());
        let week = units.get("week").unwrap();
        let day = units.get("day").unwrap();
        assert_eq!(
            calculator.calculate(dec!(8) * dec!(86400), week, day, &units).unwrap(),
            8
        );
    }

    #[test]
    fn test_custom_rule_text_result_is_parsed() {
        let units = week_and_day(4, 0);
        let calculator = DayOfWeekCalculator::new(Some(from_fn(|_| Ok(Value::from("5")))));
        let week = units.get("week").unwrap();
        let day = units.get("day").unwrap();
        assert_eq!(calculator.calculate(dec!(0), week, day, &units).unwrap(), 5);
    }

    #[test]
    fn test_custom_rule_list_result_is_type_mismatch() {
        let units = week_and_day(4, 0);
        let calculator =
            DayOfWeekCalculator::new(Some(from_fn(|_| Ok(Value::Names(vec![])))));
        let week = units.get("week").unwrap();
        let day = units.get("day").unwrap();
        assert!(matches!(
            calculator.calculate(dec!(0), week, day, &units),
            Err(CalendarError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_without_rule_uses_arithmetic() {
        let units = week_and_day(4, 0);
        let calculator = DayOfWeekCalculator::new(None);
        let week = units.get("week").unwrap();
        let day = units.get("day").unwrap();
        assert_eq!(calculator.calculate(dec!(0), week, day, &units).unwrap(), 3);
    }
}
