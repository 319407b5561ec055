//! Lunch catalog: lookups for today and this week, and their chat replies.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::debug;

use crate::dates::{self, Calendar};
use crate::flavor::{self, Picker};
use crate::models::lunch::LunchEntry;

/// Header of the weekly menu reply.
pub const WEEK_HEADER: &str = "This week the following is on the menu:\n";

/// Prefix of the daily menu reply.
pub const TODAY_PREFIX: &str = "Today we eat: ";

/// Read-only list of lunch entries loaded at startup.
///
/// Entries are kept in configuration order; lookups are linear scans.
pub struct LunchCatalog {
    entries: Vec<LunchEntry>,
    calendar: Calendar,
    picker: Arc<dyn Picker>,
}

impl LunchCatalog {
    /// Build a catalog over `entries`.
    #[must_use]
    pub fn new(entries: Vec<LunchEntry>, calendar: Calendar, picker: Arc<dyn Picker>) -> Self {
        Self {
            entries,
            calendar,
            picker,
        }
    }

    /// The first entry served today, if any.
    #[must_use]
    pub fn lunch_for_today(&self) -> Option<&LunchEntry> {
        self.entries
            .iter()
            .find(|entry| entry.date.is_some_and(|date| self.calendar.is_today(&date)))
    }

    /// Every entry served this ISO week, Monday first.
    ///
    /// Days keep insertion order among themselves, and a day with several
    /// entries contributes all of them.
    #[must_use]
    pub fn lunches_for_this_week(&self) -> Vec<&LunchEntry> {
        let today = self.calendar.today();
        debug!(
            day = %today,
            week_of_month = dates::week_of_month(today),
            "looking up lunches for this week"
        );

        let week = self.calendar.current_week_dates();
        week.into_iter()
            .flat_map(|day| {
                self.entries
                    .iter()
                    .filter(move |entry| entry.date == Some(day))
            })
            .collect()
    }

    /// Reply to "what's for lunch today".
    ///
    /// With `introduction` set, the not-found text opens with a greeting;
    /// scheduled broadcasts use this.
    #[must_use]
    pub fn format_today_message(&self, introduction: bool) -> String {
        match self.lunch_for_today() {
            Some(entry) => format!("{TODAY_PREFIX}{}", entry.description),
            None => flavor::lunch_not_found(self.picker.as_ref(), introduction),
        }
    }

    /// Reply to "what's for lunch this week".
    #[must_use]
    pub fn format_week_message(&self, introduction: bool) -> String {
        let lunches = self.lunches_for_this_week();
        let mut message = WEEK_HEADER.to_owned();

        if lunches.is_empty() {
            message.push_str(&flavor::lunch_not_found(self.picker.as_ref(), introduction));
            return message;
        }

        for entry in lunches {
            if let Some(date) = entry.date {
                let _ = writeln!(message, "{}: {}", date.format("%A"), entry.description);
            }
        }
        message
    }
}
