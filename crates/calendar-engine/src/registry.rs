//! Named calendar configurations and role → unit lookup.
//!
//! The registry is an explicit value: construct one, [`initialize`] it with
//! the resolved units and calendar definitions, then pass it by reference
//! to whatever needs calendar units. Querying an uninitialised registry is
//! an error, never an implicit empty configuration.
//!
//! [`initialize`]: CalendarRegistry::initialize

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{CalendarError, Result};
use crate::unit::{CalendarUnit, UnitSet};
use crate::value::ExpressionHandle;
use crate::weekday::{self, DayOfWeekCalculator};

/// The part a unit plays in a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Year,
    Month,
    Week,
    Day,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Year, Role::Month, Role::Week, Role::Day];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Year => "year",
            Role::Month => "month",
            Role::Week => "week",
            Role::Day => "day",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "year" => Ok(Role::Year),
            "month" => Ok(Role::Month),
            "week" => Ok(Role::Week),
            "day" => Ok(Role::Day),
            other => Err(CalendarError::InvalidConfiguration(format!(
                "unknown calendar role '{other}'"
            ))),
        }
    }
}

/// A calendar as delivered by the configuration layer: role → unit name,
/// plus an optional custom day-of-week rule.
#[derive(Clone, Default)]
pub struct CalendarDefinition {
    pub units: BTreeMap<Role, String>,
    pub day_of_week: Option<ExpressionHandle>,
}

impl CalendarDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, role: Role, unit_name: impl Into<String>) -> Self {
        self.units.insert(role, unit_name.into());
        self
    }

    pub fn with_day_of_week(mut self, rule: ExpressionHandle) -> Self {
        self.day_of_week = Some(rule);
        self
    }
}

impl fmt::Debug for CalendarDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarDefinition")
            .field("units", &self.units)
            .field("day_of_week", &self.day_of_week.is_some())
            .finish()
    }
}

// ── CalendarUnits ───────────────────────────────────────────────────────────

/// The concrete units bound to one calendar's roles.
pub struct CalendarUnits<'r> {
    name: &'r str,
    year: &'r CalendarUnit,
    month: &'r CalendarUnit,
    week: &'r CalendarUnit,
    day: &'r CalendarUnit,
    weekday: &'r DayOfWeekCalculator,
    day_of_week_fn: Option<&'r ExpressionHandle>,
    units: &'r UnitSet,
}

impl<'r> CalendarUnits<'r> {
    pub fn name(&self) -> &'r str {
        self.name
    }

    pub fn year(&self) -> &'r CalendarUnit {
        self.year
    }

    pub fn month(&self) -> &'r CalendarUnit {
        self.month
    }

    pub fn week(&self) -> &'r CalendarUnit {
        self.week
    }

    pub fn day(&self) -> &'r CalendarUnit {
        self.day
    }

    pub fn get(&self, role: Role) -> &'r CalendarUnit {
        match role {
            Role::Year => self.year,
            Role::Month => self.month,
            Role::Week => self.week,
            Role::Day => self.day,
        }
    }

    /// Every bound role with its unit, in role order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &'r CalendarUnit)> + '_ {
        Role::ALL.into_iter().map(move |role| (role, self.get(role)))
    }

    /// The custom day-of-week rule, when the calendar defines one.
    pub fn day_of_week_fn(&self) -> Option<&'r ExpressionHandle> {
        self.day_of_week_fn
    }

    /// The full unit set the calendar's units live in.
    pub fn units(&self) -> &'r UnitSet {
        self.units
    }

    /// Weekday of `timestamp`, using the custom rule if there is one.
    pub fn day_of_week(&self, timestamp: Decimal) -> Result<i64> {
        self.weekday
            .calculate(timestamp, self.week, self.day, self.units)
    }

    /// Whole days per week at `timestamp`.
    pub fn days_per_week(&self, timestamp: Decimal) -> Result<i64> {
        weekday::days_per_week(self.week, self.day, self.units, timestamp)
    }
}

impl fmt::Debug for CalendarUnits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarUnits")
            .field("name", &self.name)
            .field("year", &self.year.name())
            .field("month", &self.month.name())
            .field("week", &self.week.name())
            .field("day", &self.day.name())
            .field("day_of_week_fn", &self.day_of_week_fn.is_some())
            .finish()
    }
}

// ── CalendarRegistry ────────────────────────────────────────────────────────

struct RegisteredCalendar {
    definition: CalendarDefinition,
    weekday: DayOfWeekCalculator,
}

struct RegistryState {
    units: UnitSet,
    calendars: BTreeMap<String, RegisteredCalendar>,
}

impl RegistryState {
    fn role_unit(&self, calendar: &str, definition: &CalendarDefinition, role: Role) -> Result<&CalendarUnit> {
        let unit_name = definition
            .units
            .get(&role)
            .ok_or_else(|| CalendarError::MissingRole {
                calendar: calendar.to_string(),
                role: role.to_string(),
            })?;
        tracing::trace!(%role, unit = %unit_name, "looking up unit");
        self.units.get(unit_name)
    }
}

/// Lookup table of units and calendars.
#[derive(Default)]
pub struct CalendarRegistry {
    state: Option<RegistryState>,
}

impl CalendarRegistry {
    /// An empty, uninitialised registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install units and calendars, replacing anything registered before.
    pub fn initialize(&mut self, units: UnitSet, calendars: BTreeMap<String, CalendarDefinition>) {
        tracing::debug!(
            units = ?units.names().collect::<Vec<_>>(),
            calendars = ?calendars.keys().collect::<Vec<_>>(),
            "initializing calendar registry"
        );
        let calendars = calendars
            .into_iter()
            .map(|(name, definition)| {
                let weekday = DayOfWeekCalculator::new(definition.day_of_week.clone());
                (name, RegisteredCalendar { definition, weekday })
            })
            .collect();
        self.state = Some(RegistryState { units, calendars });
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&RegistryState> {
        self.state.as_ref().ok_or(CalendarError::NotInitialized)
    }

    pub fn units(&self) -> Result<&UnitSet> {
        Ok(&self.state()?.units)
    }

    /// Names of all registered calendars.
    pub fn calendar_names(&self) -> Result<Vec<&str>> {
        Ok(self.state()?.calendars.keys().map(String::as_str).collect())
    }

    /// Resolve a calendar's role → unit-name bindings into units.
    ///
    /// # Errors
    ///
    /// - [`CalendarError::NotInitialized`] before [`initialize`](Self::initialize)
    /// - [`CalendarError::CalendarNotFound`] for an unknown calendar
    /// - [`CalendarError::UnitNotFound`] when a binding names a missing unit
    /// - [`CalendarError::MissingRole`] when a required role is not bound
    pub fn get_calendar_units(&self, name: &str) -> Result<CalendarUnits<'_>> {
        let state = self.state()?;
        tracing::debug!(calendar = name, "getting calendar units");

        let (calendar_name, registered) = state
            .calendars
            .get_key_value(name)
            .ok_or_else(|| CalendarError::CalendarNotFound(name.to_string()))?;

        let lookup = |role: Role| state.role_unit(name, &registered.definition, role);

        let day_of_week_fn = registered.definition.day_of_week.as_ref();
        if day_of_week_fn.is_some() {
            tracing::debug!(calendar = name, "found custom day-of-week rule");
        }

        Ok(CalendarUnits {
            name: calendar_name,
            year: lookup(Role::Year)?,
            month: lookup(Role::Month)?,
            week: lookup(Role::Week)?,
            day: lookup(Role::Day)?,
            weekday: &registered.weekday,
            day_of_week_fn,
            units: &state.units,
        })
    }
}

impl fmt::Debug for CalendarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            None => f.write_str("CalendarRegistry(uninitialized)"),
            Some(state) => f
                .debug_struct("CalendarRegistry")
                .field("units", &state.units.names().collect::<Vec<_>>())
                .field("calendars", &state.calendars.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::{from_fn, PropertyValue, Value};
    use rust_decimal_macros::dec;

    fn units() -> UnitSet {
        [
            CalendarUnit::new("gyear").with_length(PropertyValue::number(31536000)),
            CalendarUnit::new("gmonth").with_length(PropertyValue::number(2592000)),
            CalendarUnit::new("gweek")
                .with_length(PropertyValue::number(604800))
                .with_offset(4),
            CalendarUnit::new("gday").with_length(PropertyValue::number(86400)),
        ]
        .into_iter()
        .collect()
    }

    fn greg() -> CalendarDefinition {
        CalendarDefinition::new()
            .with_unit(Role::Year, "gyear")
            .with_unit(Role::Month, "gmonth")
            .with_unit(Role::Week, "gweek")
            .with_unit(Role::Day, "gday")
    }

    fn registry(calendars: BTreeMap<String, CalendarDefinition>) -> CalendarRegistry {
        let mut registry = CalendarRegistry::new();
        registry.initialize(units(), calendars);
        registry
    }

    #[test]
    fn test_uninitialized_registry_fails() {
        let registry = CalendarRegistry::new();
        assert!(!registry.is_initialized());
        let err = registry.get_calendar_units("greg").unwrap_err();
        assert!(matches!(err, CalendarError::NotInitialized));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(registry.units().is_err());
    }

    #[test]
    fn test_unknown_calendar_is_configuration_error() {
        let registry = registry(BTreeMap::from([("greg".to_string(), greg())]));
        let err = registry.get_calendar_units("nonexistent").unwrap_err();
        assert!(matches!(err, CalendarError::CalendarNotFound(ref n) if n == "nonexistent"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_resolves_exactly_the_four_roles() {
        let registry = registry(BTreeMap::from([("greg".to_string(), greg())]));
        let calendar = registry.get_calendar_units("greg").unwrap();
        let roles: Vec<Role> = calendar.iter().map(|(role, _)| role).collect();
        assert_eq!(roles, vec![Role::Year, Role::Month, Role::Week, Role::Day]);
        assert_eq!(calendar.year().name(), "gyear");
        assert_eq!(calendar.get(Role::Day).name(), "gday");
        assert!(calendar.day_of_week_fn().is_none());
        assert_eq!(calendar.name(), "greg");
        assert_eq!(calendar.days_per_week(dec!(0)).unwrap(), 7);
        assert_eq!(calendar.day_of_week(dec!(0)).unwrap(), 3);
    }

    #[test]
    fn test_missing_unit_is_reported_by_name() {
        let broken = greg().with_unit(Role::Week, "fortnight");
        let registry = registry(BTreeMap::from([("greg".to_string(), broken)]));
        let err = registry.get_calendar_units("greg").unwrap_err();
        assert!(matches!(err, CalendarError::UnitNotFound(ref n) if n == "fortnight"));
    }

    #[test]
    fn test_missing_role_is_reported() {
        let mut partial = greg();
        partial.units.remove(&Role::Month);
        let registry = registry(BTreeMap::from([("greg".to_string(), partial)]));
        let err = registry.get_calendar_units("greg").unwrap_err();
        assert!(matches!(err, CalendarError::MissingRole { ref role, .. } if role == "month"));
    }

    #[test]
    fn test_custom_day_of_week_rule_is_exposed_and_used() {
        let custom = greg().with_day_of_week(from_fn(|_| Ok(Value::from(6))));
        let registry = registry(BTreeMap::from([("odd".to_string(), custom)]));
        let calendar = registry.get_calendar_units("odd").unwrap();
        assert!(calendar.day_of_week_fn().is_some());
        assert_eq!(calendar.day_of_week(dec!(0)).unwrap(), 6);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Month".parse::<Role>().unwrap(), Role::Month);
        assert!("fortnight".parse::<Role>().is_err());
    }

    #[test]
    fn test_reinitialize_replaces_calendars() {
        let mut registry = registry(BTreeMap::from([("greg".to_string(), greg())]));
        registry.initialize(units(), BTreeMap::from([("other".to_string(), greg())]));
        assert!(registry.get_calendar_units("greg").is_err());
        assert_eq!(registry.calendar_names().unwrap(), vec!["other"]);
    }
}
