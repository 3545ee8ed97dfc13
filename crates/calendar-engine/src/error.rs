//! Error types for calendar-engine operations.

use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of a [`CalendarError`].
///
/// Every kind is terminal: the engine never retries or substitutes a
/// default value for a failed computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A calendar, unit or role is missing, the registry was used before
    /// initialisation, or a definition/pattern input is malformed.
    Configuration,
    /// A resolved property does not have the numeric or list shape the
    /// computation needs.
    TypeMismatch,
    /// A recurrence search hit its iteration bound.
    SearchExhausted,
    /// Decimal arithmetic overflowed or divided by zero.
    Arithmetic,
}

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar registry not initialized")]
    NotInitialized,

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    #[error("Calendar '{calendar}' has no '{role}' unit")]
    MissingRole { calendar: String, role: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Type mismatch for {unit}.{property}: expected {expected}, got {found}")]
    TypeMismatch {
        unit: String,
        property: String,
        expected: &'static str,
        found: String,
    },

    #[error("Malformed definition for unit {unit}: {reason}")]
    MalformedDefinition { unit: String, reason: String },

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid weekday: {0}")]
    InvalidWeekday(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("No occurrence found after {iterations} iterations starting from {from}")]
    SearchExhausted { iterations: usize, from: Decimal },
}

impl CalendarError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalendarError::NotInitialized
            | CalendarError::CalendarNotFound(_)
            | CalendarError::UnitNotFound(_)
            | CalendarError::MissingRole { .. }
            | CalendarError::InvalidConfiguration(_)
            | CalendarError::MalformedDefinition { .. }
            | CalendarError::Expression(_)
            | CalendarError::InvalidDuration(_)
            | CalendarError::InvalidTime(_)
            | CalendarError::InvalidWeekday(_)
            | CalendarError::InvalidTimezone(_) => ErrorKind::Configuration,
            CalendarError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            CalendarError::SearchExhausted { .. } => ErrorKind::SearchExhausted,
            CalendarError::Overflow(_) => ErrorKind::Arithmetic,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalendarError>;
