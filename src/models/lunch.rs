//! Lunch menu entry model.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::dates::{parse_date, DateParseError};

/// Lunch entry exactly as written in the configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RawLunchEntry {
    /// Serving date as `YYYY-MM-DD`.
    pub date: String,
    /// What is being served.
    pub description: String,
}

/// A single dish served on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LunchEntry {
    /// Serving date; `None` when the source date was unreadable.
    pub date: Option<NaiveDate>,
    /// What is being served.
    pub description: String,
}

impl LunchEntry {
    /// Construct an entry with a known date.
    #[must_use]
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date: Some(date),
            description: description.into(),
        }
    }

    /// Parse an entry, failing on a malformed date.
    ///
    /// Used at configuration load time, where a bad date aborts startup.
    ///
    /// # Errors
    ///
    /// Returns [`DateParseError`] if `date` is not `YYYY-MM-DD`.
    pub fn parse(date: &str, description: impl Into<String>) -> Result<Self, DateParseError> {
        Ok(Self::new(parse_date(date)?, description))
    }

    /// Parse an entry received at runtime, leaving the date unset on failure.
    ///
    /// An entry without a date never matches "today" or "this week".
    #[must_use]
    pub fn parse_lenient(date: &str, description: impl Into<String>) -> Self {
        let date = match parse_date(date) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!(%err, "ignoring malformed lunch date");
                None
            }
        };
        Self {
            date,
            description: description.into(),
        }
    }
}

impl TryFrom<&RawLunchEntry> for LunchEntry {
    type Error = DateParseError;

    fn try_from(raw: &RawLunchEntry) -> Result<Self, Self::Error> {
        Self::parse(&raw.date, raw.description.clone())
    }
}
