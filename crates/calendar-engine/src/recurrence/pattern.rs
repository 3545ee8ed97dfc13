//! Recurrence patterns and the next-occurrence search.
//!
//! A pattern is an interval plus a list of conjunctive constraints. The
//! search steps forward from `from + interval`, snapping each candidate to
//! the shape of the schedule (explicit times, a daily window, or a minute
//! of the hour) before checking every constraint. Rejected candidates are
//! stepped by one more interval. The number of candidates is bounded.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;

use super::parse::{format_time, parse_interval, parse_time_of_day, parse_weekday, weekday_name};
use crate::config::EngineConfig;
use crate::error::{CalendarError, Result};
use crate::time::{self, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_WEEK};

const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Coarse classification of a pattern's interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyType {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Custom,
}

impl FrequencyType {
    pub fn from_seconds(seconds: Decimal) -> Self {
        if seconds == Decimal::from(SECONDS_PER_MINUTE) {
            FrequencyType::Minutely
        } else if seconds == Decimal::from(SECONDS_PER_HOUR) {
            FrequencyType::Hourly
        } else if seconds == Decimal::from(SECONDS_PER_DAY) {
            FrequencyType::Daily
        } else if seconds == Decimal::from(SECONDS_PER_WEEK) {
            FrequencyType::Weekly
        } else {
            FrequencyType::Custom
        }
    }
}

/// Caller-supplied predicate over a candidate in the pattern's timezone.
pub type ConstraintFn = Arc<dyn Fn(&DateTime<Tz>) -> bool + Send + Sync>;

/// Caller-supplied transform applied to each snapped candidate.
pub type ModifierFn = Arc<dyn Fn(Decimal) -> Decimal + Send + Sync>;

#[derive(Clone)]
enum Rule {
    Weekdays(Vec<Weekday>),
    Times,
    Window { start: NaiveTime, end: NaiveTime },
    Exclude { start: NaiveTime, end: NaiveTime },
    Minute(u32),
    Custom(ConstraintFn),
}

#[derive(Clone)]
struct Constraint {
    rule: Rule,
    description: String,
}

#[derive(Clone)]
struct Modifier {
    transform: ModifierFn,
    description: String,
}

/// An interval plus conjunctive constraints.
///
/// Built with a fallible builder chain:
///
/// ```
/// use calendar_engine::RecurrencePattern;
/// use rust_decimal::Decimal;
///
/// let standup = RecurrencePattern::every("1d")?
///     .on(&["monday", "wednesday", "friday"])?
///     .at(&["9:30"])?;
/// // From Monday 2026-03-16 00:00 UTC the first candidate is Tuesday 09:30,
/// // which fails the weekday check, so Wednesday 09:30 is next.
/// let next = standup.next_occurrence(Decimal::from(1_773_619_200))?;
/// assert_eq!(next, Decimal::from(1_773_619_200 + 2 * 86_400 + 34_200));
/// # Ok::<(), calendar_engine::CalendarError>(())
/// ```
#[derive(Clone)]
pub struct RecurrencePattern {
    name: Option<String>,
    interval: Decimal,
    interval_source: Option<String>,
    frequency: FrequencyType,
    weekdays: Option<Vec<Weekday>>,
    times: Vec<NaiveTime>,
    window: Option<(NaiveTime, NaiveTime)>,
    minute: Option<u32>,
    constraints: Vec<Constraint>,
    modifiers: Vec<Modifier>,
    groups: Vec<String>,
    timezone: Tz,
    max_iterations: usize,
}

impl RecurrencePattern {
    /// Start a pattern from an interval string such as `"2h"` or `"30 minutes"`.
    pub fn every(interval: &str) -> Result<Self> {
        let mut pattern = Self::every_seconds(parse_interval(interval)?)?;
        pattern.interval_source = Some(interval.trim().to_string());
        Ok(pattern)
    }

    /// Start a pattern from an interval in seconds.
    pub fn every_seconds(seconds: impl Into<Decimal>) -> Result<Self> {
        let interval = seconds.into();
        if interval <= Decimal::ZERO {
            return Err(CalendarError::InvalidDuration(format!(
                "interval must be positive, got {interval}"
            )));
        }
        Ok(RecurrencePattern {
            name: None,
            interval,
            interval_source: None,
            frequency: FrequencyType::from_seconds(interval),
            weekdays: None,
            times: Vec::new(),
            window: None,
            minute: None,
            constraints: Vec::new(),
            modifiers: Vec::new(),
            groups: Vec::new(),
            timezone: Tz::UTC,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only allow candidates on these weekdays. Repeated calls intersect.
    pub fn on<S: AsRef<str>>(mut self, days: &[S]) -> Result<Self> {
        if days.is_empty() {
            return Err(CalendarError::InvalidWeekday("no weekdays given".to_string()));
        }
        let mut parsed = days
            .iter()
            .map(|d| parse_weekday(d.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        parsed.sort_by_key(|d| d.num_days_from_monday());
        parsed.dedup();

        let description = format!(
            "On days: {}",
            parsed.iter().map(|d| weekday_name(*d)).collect::<Vec<_>>().join(", ")
        );
        self.weekdays = Some(match self.weekdays.take() {
            Some(existing) => existing.into_iter().filter(|d| parsed.contains(d)).collect(),
            None => parsed.clone(),
        });
        self.constraints.push(Constraint {
            rule: Rule::Weekdays(parsed),
            description,
        });
        Ok(self)
    }

    /// Fire exactly at these times of day. Repeated calls add more times.
    pub fn at<S: AsRef<str>>(mut self, times: &[S]) -> Result<Self> {
        if times.is_empty() {
            return Err(CalendarError::InvalidTime("no times given".to_string()));
        }
        for t in times {
            self.times.push(parse_time_of_day(t.as_ref())?);
        }
        self.times.sort();
        self.times.dedup();

        let description = format!(
            "At {}",
            self.times.iter().map(|t| format_time(*t)).collect::<Vec<_>>().join(", ")
        );
        match self.constraints.iter_mut().find(|c| matches!(c.rule, Rule::Times)) {
            Some(existing) => existing.description = description,
            None => self.constraints.push(Constraint {
                rule: Rule::Times,
                description,
            }),
        }
        Ok(self)
    }

    /// Fire at this minute of every hour.
    pub fn at_minute(mut self, minute: u32) -> Result<Self> {
        if minute >= 60 {
            return Err(CalendarError::InvalidTime(format!("minute {minute} out of range")));
        }
        self.minute = Some(minute);
        self.constraints.push(Constraint {
            rule: Rule::Minute(minute),
            description: format!("At minute {minute}"),
        });
        Ok(self)
    }

    /// Only allow times of day in `[start, end)`.
    pub fn between(mut self, start: &str, end: &str) -> Result<Self> {
        let (start, end) = parse_window(start, end)?;
        self.window = Some((start, end));
        self.constraints.push(Constraint {
            rule: Rule::Window { start, end },
            description: format!("Between {} and {}", format_time(start), format_time(end)),
        });
        Ok(self)
    }

    /// Reject times of day in `[start, end)`.
    pub fn except_between(mut self, start: &str, end: &str) -> Result<Self> {
        let (start, end) = parse_window(start, end)?;
        self.constraints.push(Constraint {
            rule: Rule::Exclude { start, end },
            description: format!("Except between {} and {}", format_time(start), format_time(end)),
        });
        Ok(self)
    }

    /// Add a custom predicate; every constraint must hold for a candidate.
    pub fn add_constraint<F>(&mut self, description: impl Into<String>, predicate: F)
    where
        F: Fn(&DateTime<Tz>) -> bool + Send + Sync + 'static,
    {
        self.constraints.push(Constraint {
            rule: Rule::Custom(Arc::new(predicate)),
            description: description.into(),
        });
    }

    /// Add a transform applied, in insertion order, to every snapped candidate.
    pub fn add_modifier<F>(&mut self, description: impl Into<String>, transform: F)
    where
        F: Fn(Decimal) -> Decimal + Send + Sync + 'static,
    {
        self.modifiers.push(Modifier {
            transform: Arc::new(transform),
            description: description.into(),
        });
    }

    pub fn add_to_groups<S: AsRef<str>>(mut self, groups: &[S]) -> Self {
        self.groups
            .extend(groups.iter().map(|g| g.as_ref().to_string()));
        self
    }

    /// Evaluate weekdays and times of day in an IANA timezone.
    pub fn in_timezone(self, name: &str) -> Result<Self> {
        let tz: Tz = name
            .trim()
            .parse()
            .map_err(|_| CalendarError::InvalidTimezone(name.to_string()))?;
        Ok(self.with_timezone(tz))
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Result<Self> {
        if max == 0 {
            return Err(CalendarError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        self.max_iterations = max;
        Ok(self)
    }

    /// Take the search bound from an engine config.
    pub fn with_config(self, config: &EngineConfig) -> Result<Self> {
        self.with_max_iterations(config.max_search_iterations)
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Interval in seconds.
    pub fn interval(&self) -> Decimal {
        self.interval
    }

    pub fn frequency(&self) -> FrequencyType {
        self.frequency
    }

    /// Allowed weekdays, or `None` when unrestricted.
    pub fn weekdays(&self) -> Option<&[Weekday]> {
        self.weekdays.as_deref()
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn window(&self) -> Option<(NaiveTime, NaiveTime)> {
        self.window
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Constraint descriptions in insertion order, followed by modifiers.
    pub fn describe(&self) -> Vec<String> {
        self.constraints
            .iter()
            .map(|c| c.description.clone())
            .chain(self.modifiers.iter().map(|m| m.description.clone()))
            .collect()
    }

    // ── Evaluation ──────────────────────────────────────────────────────

    /// True when `timestamp` satisfies every constraint.
    pub fn matches(&self, timestamp: Decimal) -> Result<bool> {
        let local = self.local(timestamp)?;
        Ok(self.constraints.iter().all(|c| self.holds(&c.rule, &local)))
    }

    /// The first timestamp after `from` that satisfies every constraint.
    ///
    /// With no constraints and no modifiers this is exactly
    /// `from + interval`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::SearchExhausted`] when no candidate is
    /// accepted within `max_iterations` steps.
    #[tracing::instrument(skip(self), fields(interval = %self.interval))]
    pub fn next_occurrence(&self, from: Decimal) -> Result<Decimal> {
        if self.constraints.is_empty() && self.modifiers.is_empty() {
            return time::add(from, self.interval);
        }

        let mut candidate = time::add(from, self.interval)?;
        let mut floor = from;
        for iteration in 0..self.max_iterations {
            let snapped = self.snap(candidate, floor)?;
            let modified = self
                .modifiers
                .iter()
                .fold(snapped, |t, m| (m.transform)(t));
            if modified > from && self.matches(modified)? {
                tracing::trace!(iteration, %modified, "accepted candidate");
                return Ok(modified);
            }
            tracing::trace!(iteration, %snapped, "rejected candidate");
            floor = floor.max(snapped);
            // Try the remaining target times on the same day before stepping.
            candidate = if self.has_later_time_on_day(snapped)? {
                snapped
            } else {
                time::add(snapped, self.interval)?
            };
        }

        tracing::warn!(
            pattern = self.name.as_deref().unwrap_or("<unnamed>"),
            iterations = self.max_iterations,
            %from,
            "recurrence search exhausted"
        );
        Err(CalendarError::SearchExhausted {
            iterations: self.max_iterations,
            from,
        })
    }

    /// Lazily chain [`next_occurrence`](Self::next_occurrence) from `from`.
    pub fn occurrences(&self, from: Decimal) -> Occurrences<'_> {
        Occurrences {
            pattern: self,
            current: from,
            done: false,
        }
    }

    pub fn next_n(&self, from: Decimal, n: usize) -> Result<Vec<Decimal>> {
        self.occurrences(from).take(n).collect()
    }

    fn holds(&self, rule: &Rule, local: &DateTime<Tz>) -> bool {
        let time_of_day = local.time();
        match rule {
            Rule::Weekdays(days) => days.contains(&local.weekday()),
            Rule::Times => self.times.contains(&time_of_day),
            Rule::Window { start, end } => *start <= time_of_day && time_of_day < *end,
            Rule::Exclude { start, end } => !(*start <= time_of_day && time_of_day < *end),
            Rule::Minute(minute) => local.minute() == *minute && local.second() == 0,
            Rule::Custom(predicate) => predicate(local),
        }
    }

    fn local(&self, timestamp: Decimal) -> Result<DateTime<Tz>> {
        Ok(time::to_datetime(timestamp)?.with_timezone(&self.timezone))
    }

    /// The instant of `time` on local `date`, or `None` inside a DST gap.
    fn instant_at(&self, date: NaiveDate, wall: NaiveTime) -> Option<Decimal> {
        self.timezone
            .from_local_datetime(&date.and_time(wall))
            .earliest()
            .map(|dt| time::from_datetime(&dt))
    }

    // ── Snapping ────────────────────────────────────────────────────────

    fn snap(&self, candidate: Decimal, floor: Decimal) -> Result<Decimal> {
        if !self.times.is_empty() {
            self.snap_to_times(candidate, floor)
        } else if let Some((start, end)) = self.window {
            self.snap_to_window(candidate, floor, start, end)
        } else if let Some(minute) = self.minute {
            self.snap_to_minute(candidate, floor, minute)
        } else {
            Ok(candidate)
        }
    }

    /// First target time on the candidate's day later than `floor`, else
    /// the first target on a following day.
    fn snap_to_times(&self, candidate: Decimal, floor: Decimal) -> Result<Decimal> {
        let mut date = self.local(candidate)?.date_naive();
        for _ in 0..3 {
            let hit = self
                .times
                .iter()
                .filter_map(|t| self.instant_at(date, *t))
                .find(|instant| *instant > floor);
            if let Some(instant) = hit {
                return Ok(instant);
            }
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
        Ok(candidate)
    }

    /// True when a target time falls later on the local day of `instant`.
    fn has_later_time_on_day(&self, instant: Decimal) -> Result<bool> {
        if self.times.is_empty() {
            return Ok(false);
        }
        let date = self.local(instant)?.date_naive();
        Ok(self
            .times
            .iter()
            .filter_map(|t| self.instant_at(date, *t))
            .any(|target| target > instant))
    }

    fn snap_to_window(
        &self,
        candidate: Decimal,
        floor: Decimal,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Decimal> {
        let local = self.local(candidate)?;
        let date = local.date_naive();

        // Whole-day steps land on the window start.
        if self.interval >= Decimal::from(SECONDS_PER_DAY) {
            return Ok(self.window_start_after(date, start, floor).unwrap_or(candidate));
        }

        let offset = seconds_into_day(local.time());
        let start_offset = seconds_into_day(start);
        let end_offset = seconds_into_day(end);

        if offset < start_offset {
            return Ok(self.window_start_after(date, start, floor).unwrap_or(candidate));
        }
        if offset < end_offset {
            let aligned = time::mul(time::div(offset, self.interval)?.ceil(), self.interval)?;
            if aligned < end_offset {
                return time::add(candidate, time::sub(aligned, offset)?);
            }
        }
        Ok(date
            .succ_opt()
            .and_then(|tomorrow| self.window_start_after(tomorrow, start, floor))
            .unwrap_or(candidate))
    }

    /// The window start on `date` or one of the next two days, strictly after `floor`.
    fn window_start_after(&self, date: NaiveDate, start: NaiveTime, floor: Decimal) -> Option<Decimal> {
        let mut date = date;
        for _ in 0..3 {
            if let Some(instant) = self.instant_at(date, start).filter(|i| *i > floor) {
                return Some(instant);
            }
            date = date.succ_opt()?;
        }
        None
    }

    fn snap_to_minute(&self, candidate: Decimal, floor: Decimal, minute: u32) -> Result<Decimal> {
        let local = self.local(candidate)?;
        let Some(target) = NaiveTime::from_hms_opt(local.hour(), minute, 0)
            .and_then(|t| self.instant_at(local.date_naive(), t))
        else {
            return Ok(candidate);
        };
        if target > floor {
            Ok(target)
        } else {
            time::add(target, Decimal::from(SECONDS_PER_HOUR))
        }
    }
}

fn parse_window(start: &str, end: &str) -> Result<(NaiveTime, NaiveTime)> {
    let start = parse_time_of_day(start)?;
    let end = parse_time_of_day(end)?;
    if start >= end {
        return Err(CalendarError::InvalidTime(format!(
            "window start {} must be before end {}",
            format_time(start),
            format_time(end)
        )));
    }
    Ok((start, end))
}

fn seconds_into_day(t: NaiveTime) -> Decimal {
    let whole = Decimal::from(t.num_seconds_from_midnight());
    match t.nanosecond() {
        0 => whole,
        nanos => whole + Decimal::from(nanos) / Decimal::from(1_000_000_000),
    }
}

impl fmt::Debug for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurrencePattern")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("frequency", &self.frequency)
            .field("constraints", &self.describe())
            .field("timezone", &self.timezone)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.interval_source {
            Some(source) => write!(f, "Every {source}")?,
            None => write!(f, "Every {}s", self.interval)?,
        }
        for description in self.describe() {
            write!(f, "; {description}")?;
        }
        Ok(())
    }
}

/// Iterator over successive occurrences. Stops after the first error.
pub struct Occurrences<'a> {
    pattern: &'a RecurrencePattern,
    current: Decimal,
    done: bool,
}

impl Iterator for Occurrences<'_> {
    type Item = Result<Decimal>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pattern.next_occurrence(self.current) {
            Ok(next) => {
                self.current = next;
                Some(Ok(next))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
