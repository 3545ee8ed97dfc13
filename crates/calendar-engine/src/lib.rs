//! # calendar-engine
//!
//! Calendar arithmetic for calendars defined as data.
//!
//! Years, months, weeks and days are [`CalendarUnit`]s whose length, start,
//! names and timezone are either literals or computed properties evaluated
//! against sibling units and a timestamp. From those definitions the engine
//! derives unit indices, weekdays, year and month windows, full year
//! layouts, and next occurrences of constraint-based recurrence patterns.
//! Timestamps are decimal seconds since the epoch; sub-second precision is
//! kept throughout.
//!
//! ## Modules
//!
//! - [`value`] — Literal/computed property values and the expression interface
//! - [`unit`] — Calendar units, property resolution and index calculation
//! - [`weekday`] — Day-of-week arithmetic and custom weekday rules
//! - [`year`] — Year number, start and length
//! - [`month`] — Month windows, week counts and row cursors
//! - [`registry`] — Named calendars bound to units by role
//! - [`layout`] — Year layouts of month groups, week rows and day cells
//! - [`recurrence`] — Recurrence patterns and next-occurrence search
//! - [`presets`] — A Gregorian calendar built from computed properties
//! - [`config`] — Engine tunables
//! - [`time`] — Time ranges and decimal ↔ chrono conversion
//! - [`error`] — Error types

pub mod config;
pub mod error;
pub mod layout;
pub mod month;
pub mod presets;
pub mod recurrence;
pub mod registry;
pub mod time;
pub mod unit;
pub mod value;
pub mod weekday;
pub mod year;

pub use config::EngineConfig;
pub use error::{CalendarError, ErrorKind, Result};
pub use layout::{
    CalendarLayoutBuilder, CalendarState, DayCell, MonthGroup, MonthHeader, WeekRow, YearLayout,
};
pub use month::{advance_cursor_after_week, max_weeks_needed, month_window, MonthData};
pub use recurrence::{FrequencyType, RecurrencePattern};
pub use registry::{CalendarDefinition, CalendarRegistry, CalendarUnits, Role};
pub use time::TimeRange;
pub use unit::{CalendarUnit, Property, UnitSet};
pub use value::{
    from_fn, Environment, Evaluator, Expression, ExpressionHandle, PropertyValue, Scope, Value,
};
pub use weekday::{day_of_week, days_per_week, DayOfWeekCalculator};
pub use year::{year_data, YearData};
