//! Monthly on-call compensation report.
//!
//! The billing cycle closes at 11:01 on the 18th of the month in the
//! reference timezone. A report covers the cycle that closed last month:
//! from one minute past the previous boundary up to that boundary. A shift
//! is billed only once it has fully ended inside the window; shifts still
//! running at the boundary are left for the next report, whatever their
//! start time.

use std::fmt::Write as _;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::oncall::{CompensationReportLine, OnCallInterval, ScheduleDetail};
use crate::{AppError, Result};

/// Day of the month the billing cycle closes.
pub const BILLING_DAY: u32 = 18;
/// Hour of the closing minute.
pub const BILLING_HOUR: u32 = 11;
/// Minute of the closing hour.
pub const BILLING_MINUTE: u32 = 1;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Time range a report bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingWindow {
    /// One minute past the previous cycle's boundary.
    pub from: DateTime<Utc>,
    /// Cycle boundary; shifts must end strictly before this.
    pub until: DateTime<Utc>,
}

impl BillingWindow {
    /// Window with explicit bounds.
    #[must_use]
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { from, until }
    }

    /// Whether a shift ending at `end` is billed in this window.
    #[must_use]
    pub fn bills(&self, end: DateTime<Utc>) -> bool {
        end < self.until
    }
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Config(format!("{local} does not exist in timezone {tz}")))
}

/// The billing window of the cycle that closed last month, seen from `now`.
///
/// `until` is 11:01 on the 18th of the previous calendar month in `now`'s
/// timezone; `from` is `until` moved back one calendar month plus one minute.
///
/// # Errors
///
/// Returns `AppError::Config` if the boundary cannot be represented in the
/// timezone.
pub fn billing_window(now: DateTime<Tz>) -> Result<BillingWindow> {
    let tz = now.timezone();
    let local = now.naive_local();
    let out_of_range = || AppError::Config(format!("billing window out of range for {local}"));

    let previous_month = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
        .and_then(|first| first.checked_sub_months(Months::new(1)))
        .ok_or_else(out_of_range)?;
    let until_local = previous_month
        .with_day(BILLING_DAY)
        .and_then(|day| day.and_hms_opt(BILLING_HOUR, BILLING_MINUTE, 0))
        .ok_or_else(out_of_range)?;
    let from_local = until_local
        .checked_sub_months(Months::new(1))
        .and_then(|start| start.checked_add_signed(TimeDelta::minutes(1)))
        .ok_or_else(out_of_range)?;

    Ok(BillingWindow {
        from: resolve_local(tz, from_local)?,
        until: resolve_local(tz, until_local)?,
    })
}

/// Billable lines for `intervals`, in the order given.
///
/// Intervals ending at or after `window.until` are skipped.
#[must_use]
pub fn compile_lines(
    intervals: &[OnCallInterval],
    window: &BillingWindow,
    weekly_rate: f64,
) -> Vec<CompensationReportLine> {
    intervals
        .iter()
        .filter(|interval| window.bills(interval.end))
        .map(|interval| {
            #[allow(clippy::cast_precision_loss)] // shift lengths are far below 2^52 seconds
            let duration_hours = (interval.end - interval.start).num_seconds() as f64 / 3600.0;
            let week_units = duration_hours / 24.0 / 7.0;
            CompensationReportLine {
                start: interval.start,
                end: interval.end,
                user: interval.user_name.clone(),
                duration_hours,
                week_units,
                amount: week_units * weekly_rate,
            }
        })
        .collect()
}

/// A compiled report, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationReport {
    /// Window the report bills for.
    pub window: BillingWindow,
    /// Schedules the report covers, in provider order.
    pub schedules: Vec<ScheduleDetail>,
    /// Billable shifts, in provider order.
    pub lines: Vec<CompensationReportLine>,
    /// Timezone used for rendering timestamps.
    pub tz: Tz,
}

impl CompensationReport {
    /// Sum of all line amounts.
    #[must_use]
    pub fn total_amount(&self) -> f64 {
        self.lines.iter().map(|line| line.amount).sum()
    }

    /// Header line naming the window and schedules.
    #[must_use]
    pub fn header(&self) -> String {
        let schedules = if self.schedules.is_empty() {
            "none".to_owned()
        } else {
            self.schedules
                .iter()
                .map(|schedule| schedule.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "On-call compensation report {} until {} ({}), schedules: {schedules}",
            self.format_time(self.window.from),
            self.format_time(self.window.until),
            self.tz,
        )
    }

    /// Render the header followed by one line per billed shift.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.header();
        text.push('\n');
        for line in &self.lines {
            let _ = writeln!(
                text,
                "{} - {} | {} | {:.2} hours | {:.3} weeks | {:.2}",
                self.format_time(line.start),
                self.format_time(line.end),
                line.user,
                line.duration_hours,
                line.week_units,
                line.amount,
            );
        }
        text
    }

    fn format_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format(TIMESTAMP_FORMAT).to_string()
    }
}
