//! Calendar helpers and the time-source capability.
//!
//! Everything that asks "what day is it" goes through a [`Calendar`], which
//! pairs a [`Clock`] with the bot's reference timezone. Tests swap in a
//! [`FixedClock`] to freeze time.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;

/// Date format used by configuration files and lunch entries.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A date string did not match the expected format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    /// Offending input text.
    pub input: String,
    /// Format the input was checked against.
    pub format: String,
    reason: String,
}

impl Display for DateParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' does not match format '{}': {}",
            self.input, self.format, self.reason
        )
    }
}

impl std::error::Error for DateParseError {}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`DateParseError`] if `text` is not a valid calendar date.
pub fn parse_date(text: &str) -> Result<NaiveDate, DateParseError> {
    parse_date_with_format(text, DEFAULT_DATE_FORMAT)
}

/// Parse a date using an explicit `chrono` format string.
///
/// # Errors
///
/// Returns [`DateParseError`] if `text` does not match `format`.
pub fn parse_date_with_format(text: &str, format: &str) -> Result<NaiveDate, DateParseError> {
    NaiveDate::parse_from_str(text.trim(), format).map_err(|err| DateParseError {
        input: text.to_owned(),
        format: format.to_owned(),
        reason: err.to_string(),
    })
}

/// True when both values fall on the same calendar day.
///
/// Only year, month, and day-of-month are compared; time of day and offset
/// are ignored.
#[must_use]
pub fn is_same_day<A: Datelike, B: Datelike>(a: &A, b: &B) -> bool {
    a.year() == b.year() && a.month() == b.month() && a.day() == b.day()
}

/// 1-based week of the month, counted in ISO weeks.
///
/// Computed as `1 + isoWeek(date) - isoWeek(first day of month)`. Early
/// January dates whose first of the month belongs to the previous ISO year
/// yield zero or negative values; callers only log this number.
#[must_use]
pub fn week_of_month(date: NaiveDate) -> i32 {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    let week = i32::try_from(date.iso_week().week()).unwrap_or_default();
    let first_week = i32::try_from(first.iso_week().week()).unwrap_or_default();
    1 + week - first_week
}

/// Monday through Sunday of the ISO week containing `anchor`.
#[must_use]
pub fn iso_week_dates(anchor: NaiveDate) -> [NaiveDate; 7] {
    let monday = anchor - Days::new(u64::from(anchor.weekday().num_days_from_monday()));
    std::array::from_fn(|offset| monday + Days::new(offset as u64))
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Local-calendar view over a [`Clock`] in the bot's reference timezone.
#[derive(Clone)]
pub struct Calendar {
    tz: Tz,
    clock: Arc<dyn Clock>,
}

impl Calendar {
    /// Build a calendar from an explicit clock.
    #[must_use]
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { tz, clock }
    }

    /// Calendar backed by the system clock.
    #[must_use]
    pub fn system(tz: Tz) -> Self {
        Self::new(tz, Arc::new(SystemClock))
    }

    /// Reference timezone.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current instant in the reference timezone.
    #[must_use]
    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.tz)
    }

    /// Local calendar date of today.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Whether `date` is today in the reference timezone.
    #[must_use]
    pub fn is_today<D: Datelike>(&self, date: &D) -> bool {
        is_same_day(date, &self.today())
    }

    /// The seven dates of the current ISO week, Monday first.
    #[must_use]
    pub fn current_week_dates(&self) -> [NaiveDate; 7] {
        iso_week_dates(self.today())
    }
}

impl std::fmt::Debug for Calendar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calendar")
            .field("tz", &self.tz)
            .field("now", &self.clock.now())
            .finish()
    }
}
