//! Constraint-based recurrence scheduling.
//!
//! - [`RecurrencePattern`] — interval + constraints, with [`RecurrencePattern::next_occurrence`]
//! - [`parse_interval`], [`parse_time_of_day`], [`parse_weekday`] — input parsers

mod parse;
mod pattern;

pub use parse::{parse_interval, parse_time_of_day, parse_weekday};
pub use pattern::{ConstraintFn, FrequencyType, ModifierFn, Occurrences, RecurrencePattern};
