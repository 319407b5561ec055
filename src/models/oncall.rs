//! On-call domain models: provider results, the cached roster, and report lines.

use chrono::{DateTime, Utc};

/// A user the provider reports as on call for one schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUser {
    /// Provider user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// First team the user belongs to, if any.
    pub team: Option<String>,
}

/// One way of reaching a user (phone, SMS, email, push).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMethod {
    /// Provider contact method type, e.g. `phone_contact_method`.
    pub kind: String,
    /// Address in the provider's format; phone numbers include the country code.
    pub address: String,
}

impl ContactMethod {
    /// Whether this contact method is a voice phone number.
    #[must_use]
    pub fn is_phone(&self) -> bool {
        self.kind.starts_with("phone_contact_method")
    }
}

/// Metadata of a single on-call schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDetail {
    /// Provider schedule id.
    pub id: String,
    /// Human-readable schedule name.
    pub name: String,
    /// IANA timezone the schedule is defined in.
    pub time_zone: String,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// A time range during which a user is the responder for a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCallInterval {
    /// Schedule the shift belongs to.
    pub schedule_id: String,
    /// Responder's user id.
    pub user_id: String,
    /// Responder's display name.
    pub user_name: String,
    /// Team or schedule label, when the provider supplies one.
    pub team_summary: Option<String>,
    /// Shift start.
    pub start: DateTime<Utc>,
    /// Shift end.
    pub end: DateTime<Utc>,
}

/// A resolved member of the current on-call roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCallUser {
    /// Provider user id.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Team label used to group the roster reply.
    pub team: Option<String>,
    /// Phone number, when the user has one on file.
    pub phone: Option<String>,
}

/// Users on call across all schedules at one sampled instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCallRoster {
    /// Unique by user id; the first schedule listing a user wins.
    pub users: Vec<OnCallUser>,
    /// When this snapshot was taken.
    pub refreshed_at: DateTime<Utc>,
}

impl OnCallRoster {
    /// An empty roster stamped with `refreshed_at`.
    #[must_use]
    pub fn empty(refreshed_at: DateTime<Utc>) -> Self {
        Self {
            users: Vec::new(),
            refreshed_at,
        }
    }

    /// Whether the roster holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// One billable shift in the monthly compensation report.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationReportLine {
    /// Shift start.
    pub start: DateTime<Utc>,
    /// Shift end.
    pub end: DateTime<Utc>,
    /// Responder's display name.
    pub user: String,
    /// Shift length in hours.
    pub duration_hours: f64,
    /// Shift length in weeks of coverage.
    pub week_units: f64,
    /// Payable amount: `week_units × weekly rate`.
    pub amount: f64,
}
