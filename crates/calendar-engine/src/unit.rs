//! Calendar units: named periods whose properties are literal or computed.
//!
//! A [`CalendarUnit`] never owns its siblings. Every read takes the
//! [`UnitSet`] the unit lives in, and computed properties see that set
//! through their [`Environment`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use crate::error::{CalendarError, Result};
use crate::time::{self, TimeRange};
use crate::value::{Environment, Evaluator, PropertyValue, Scope, Value};

/// The properties a unit can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    Length,
    Start,
    Names,
    Timezone,
    Index,
}

impl Property {
    pub fn as_str(self) -> &'static str {
        match self {
            Property::Length => "length",
            Property::Start => "start",
            Property::Names => "names",
            Property::Timezone => "timezone",
            Property::Index => "index",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── CalendarUnit ────────────────────────────────────────────────────────────

/// A named, parameterised period (year, month, week, day, ...).
pub struct CalendarUnit {
    name: String,
    length: PropertyValue,
    start: PropertyValue,
    names: Option<PropertyValue>,
    timezone: PropertyValue,
    offset: i64,
    index: Option<PropertyValue>,
    cached_index: AtomicI64,
    evaluators: Mutex<HashMap<Property, CompiledProperty>>,
}

/// A compiled expression together with the sibling names it was compiled against.
struct CompiledProperty {
    siblings: Vec<String>,
    evaluator: Arc<dyn Evaluator>,
}

impl CalendarUnit {
    /// A unit with zero length, start and timezone, no names and no offset.
    pub fn new(name: impl Into<String>) -> Self {
        CalendarUnit {
            name: name.into(),
            length: PropertyValue::number(0),
            start: PropertyValue::number(0),
            names: None,
            timezone: PropertyValue::number(0),
            offset: 0,
            index: None,
            cached_index: AtomicI64::new(0),
            evaluators: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_length(mut self, length: PropertyValue) -> Self {
        self.length = length;
        self
    }

    pub fn with_start(mut self, start: PropertyValue) -> Self {
        self.start = start;
        self
    }

    pub fn with_names(mut self, names: PropertyValue) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_timezone(mut self, timezone: PropertyValue) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// A configured index rule. When it resolves to a non-zero value,
    /// [`calculate_index`](Self::calculate_index) uses it instead of
    /// deriving the index from names, length and start.
    pub fn with_index(mut self, index: PropertyValue) -> Self {
        self.index = Some(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional shift, e.g. the week start day.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The index stored by the last [`calculate_index`](Self::calculate_index) call.
    pub fn index(&self) -> i64 {
        self.cached_index.load(Ordering::Relaxed)
    }

    pub fn property(&self, property: Property) -> Option<&PropertyValue> {
        match property {
            Property::Length => Some(&self.length),
            Property::Start => Some(&self.start),
            Property::Names => self.names.as_ref(),
            Property::Timezone => Some(&self.timezone),
            Property::Index => self.index.as_ref(),
        }
    }

    /// Resolve a property at `timestamp`.
    ///
    /// Literals pass through unchanged. Computed properties are compiled on
    /// first use (the compiled evaluator is cached per property, never the
    /// value) and evaluated with this unit, its siblings, the timestamp and
    /// `args` in scope. Returns `None` only for an absent optional property.
    ///
    /// A cached evaluator is reused only while `units` holds the same unit
    /// names it was compiled against; reading through a different set
    /// recompiles.
    pub fn get_value(
        &self,
        property: Property,
        units: &UnitSet,
        timestamp: Decimal,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let value = match self.property(property) {
            None => return Ok(None),
            Some(PropertyValue::Literal(v)) => v.clone(),
            Some(PropertyValue::Computed(expr)) => {
                let evaluator = self.evaluator(property, expr.as_ref(), units)?;
                let env = Environment {
                    unit: self,
                    units,
                    timestamp,
                    args,
                };
                evaluator.evaluate(&env)?
            }
        };
        Ok(Some(value))
    }

    fn evaluator(
        &self,
        property: Property,
        expr: &dyn crate::value::Expression,
        units: &UnitSet,
    ) -> Result<Arc<dyn Evaluator>> {
        // The lock is released before evaluation: expressions may read
        // other properties of this same unit.
        let mut cache = self
            .evaluators
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(compiled) = cache.get(&property) {
            if compiled.siblings.iter().map(String::as_str).eq(units.names()) {
                return Ok(Arc::clone(&compiled.evaluator));
            }
        }
        let scope = Scope {
            unit: &self.name,
            siblings: units.names().collect(),
        };
        let evaluator = expr.compile(&scope)?;
        tracing::trace!(unit = %self.name, %property, "compiled property expression");
        cache.insert(
            property,
            CompiledProperty {
                siblings: scope.siblings.iter().map(|s| s.to_string()).collect(),
                evaluator: Arc::clone(&evaluator),
            },
        );
        Ok(evaluator)
    }

    fn number(
        &self,
        property: Property,
        units: &UnitSet,
        timestamp: Decimal,
        args: &[Value],
    ) -> Result<Decimal> {
        match self.get_value(property, units, timestamp, args)? {
            Some(Value::Number(n)) => Ok(n),
            Some(other) => Err(self.mismatch(property, "number", other.describe())),
            None => Err(self.mismatch(property, "number", "nothing".to_string())),
        }
    }

    fn mismatch(&self, property: Property, expected: &'static str, found: String) -> CalendarError {
        CalendarError::TypeMismatch {
            unit: self.name.clone(),
            property: property.to_string(),
            expected,
            found,
        }
    }

    /// Duration of one instance of this unit, in seconds.
    pub fn length(&self, units: &UnitSet, timestamp: Decimal) -> Result<Decimal> {
        self.number(Property::Length, units, timestamp, &[])
    }

    /// Length with extra arguments (e.g. a month index for variable months).
    pub fn length_with(&self, units: &UnitSet, timestamp: Decimal, args: &[Value]) -> Result<Decimal> {
        self.number(Property::Length, units, timestamp, args)
    }

    pub fn start(&self, units: &UnitSet, timestamp: Decimal) -> Result<Decimal> {
        self.number(Property::Start, units, timestamp, &[])
    }

    /// Timezone offset in seconds.
    pub fn timezone(&self, units: &UnitSet, timestamp: Decimal) -> Result<Decimal> {
        self.number(Property::Timezone, units, timestamp, &[])
    }

    /// The ordered names, or `None` when the unit has none.
    pub fn names(&self, units: &UnitSet, timestamp: Decimal) -> Result<Option<Vec<String>>> {
        match self.get_value(Property::Names, units, timestamp, &[])? {
            Some(Value::Names(names)) => Ok(Some(names)),
            Some(other) => Err(self.mismatch(Property::Names, "names", other.describe())),
            None => Ok(None),
        }
    }

    /// `[start(T), start(T) + length(T))`.
    pub fn time_range(&self, units: &UnitSet, timestamp: Decimal) -> Result<TimeRange> {
        let start = self.start(units, timestamp)?;
        let end = time::add(start, self.length(units, timestamp)?)?;
        Ok(TimeRange::new(start, end))
    }

    /// Compute and cache the occurrence index of `timestamp` within this unit.
    ///
    /// A configured non-zero index wins. Otherwise, when the unit has a
    /// non-empty names list and a positive length, the index is
    /// `floor((T - start) / length * len(names))` wrapped into
    /// `[0, len(names))`; in every other case it is 0.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::MalformedDefinition`] if length or start do
    /// not resolve to numbers or names does not resolve to a list.
    pub fn calculate_index(&self, units: &UnitSet, timestamp: Decimal) -> Result<i64> {
        let configured = match self.get_value(Property::Index, units, timestamp, &[])? {
            Some(Value::Number(n)) => time::floor_i64(n)?,
            Some(other) => return Err(self.malformed(Property::Index, "a number", &other)),
            None => 0,
        };

        let index = if configured != 0 {
            configured
        } else {
            self.derive_index(units, timestamp)?
        };

        self.cached_index.store(index, Ordering::Relaxed);
        tracing::trace!(unit = %self.name, %timestamp, index, "calculated unit index");
        Ok(index)
    }

    fn derive_index(&self, units: &UnitSet, timestamp: Decimal) -> Result<i64> {
        let names = match self.get_value(Property::Names, units, timestamp, &[])? {
            Some(Value::Names(names)) => Some(names),
            Some(other) => return Err(self.malformed(Property::Names, "a list", &other)),
            None => None,
        };
        let length = match self.get_value(Property::Length, units, timestamp, &[])? {
            Some(Value::Number(n)) => n,
            Some(other) => return Err(self.malformed(Property::Length, "a number", &other)),
            None => Decimal::ZERO,
        };
        let start = match self.get_value(Property::Start, units, timestamp, &[])? {
            Some(Value::Number(n)) => n,
            Some(other) => return Err(self.malformed(Property::Start, "a number", &other)),
            None => Decimal::ZERO,
        };

        let names_len = match names {
            Some(names) if !names.is_empty() => names.len() as i64,
            _ => return Ok(0),
        };
        if length <= Decimal::ZERO {
            return Ok(0);
        }

        // Multiply before dividing so exact boundaries do not round down.
        let scaled = time::mul(time::sub(timestamp, start)?, Decimal::from(names_len))?;
        let raw = time::floor_div(scaled, length)?;
        Ok(raw.rem_euclid(names_len))
    }

    fn malformed(&self, property: Property, expected: &str, found: &Value) -> CalendarError {
        CalendarError::MalformedDefinition {
            unit: self.name.clone(),
            reason: format!("{property} must be {expected}, got {}", found.describe()),
        }
    }
}

impl fmt::Debug for CalendarUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarUnit")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("start", &self.start)
            .field("names", &self.names)
            .field("timezone", &self.timezone)
            .field("offset", &self.offset)
            .field("index", &self.index())
            .finish()
    }
}

// ── UnitSet ─────────────────────────────────────────────────────────────────

/// All units of a configuration, keyed by name.
#[derive(Debug, Default)]
pub struct UnitSet {
    units: BTreeMap<String, CalendarUnit>,
}

impl UnitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit, replacing any previous unit with the same name.
    pub fn insert(&mut self, unit: CalendarUnit) {
        self.units.insert(unit.name.clone(), unit);
    }

    pub fn get(&self, name: &str) -> Result<&CalendarUnit> {
        self.units
            .get(name)
            .ok_or_else(|| CalendarError::UnitNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalendarUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Recompute every unit's index at `timestamp`.
    pub fn calculate_indices(&self, timestamp: Decimal) -> Result<()> {
        for unit in self.units.values() {
            unit.calculate_index(self, timestamp)?;
        }
        Ok(())
    }
}

impl FromIterator<CalendarUnit> for UnitSet {
    fn from_iter<I: IntoIterator<Item = CalendarUnit>>(iter: I) -> Self {
        let mut set = UnitSet::new();
        for unit in iter {
            set.insert(unit);
        }
        set
    }
}
