//! On-call roster and compensation reporting.
//!
//! [`OnCallService`] owns the roster cache and turns provider data into the
//! two on-call replies: who is on call now, and the monthly compensation
//! report.

pub mod fanout;
pub mod pagerduty;
pub mod provider;
pub mod report;
pub mod roster;

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tracing::{info, info_span, Instrument};

use crate::dates::Calendar;
use crate::models::oncall::{ContactMethod, OnCallRoster, OnCallUser};
use crate::Result;

use self::provider::OnCallProvider;
use self::report::{BillingWindow, CompensationReport};
use self::roster::RosterCache;

/// Width in seconds of the sampling window used to ask "who is on call right now".
const ROSTER_SAMPLE_SECONDS: i64 = 1;

/// Roster cache plus report compilation over one provider.
pub struct OnCallService {
    provider: Arc<dyn OnCallProvider>,
    roster: RosterCache,
    calendar: Calendar,
    weekly_rate: f64,
}

impl OnCallService {
    /// Create a service with an empty roster cache.
    #[must_use]
    pub fn new(provider: Arc<dyn OnCallProvider>, calendar: Calendar, weekly_rate: f64) -> Self {
        let roster = RosterCache::new(calendar.now().with_timezone(&Utc));
        Self {
            provider,
            roster,
            calendar,
            weekly_rate,
        }
    }

    /// The roster cache shared with readers.
    #[must_use]
    pub fn roster(&self) -> &RosterCache {
        &self.roster
    }

    /// Sample who is on call right now and swap the result into the cache.
    ///
    /// The new roster is built completely before it replaces the old one.
    ///
    /// # Errors
    ///
    /// Returns the first provider error; the cached roster is left untouched.
    pub async fn refresh_roster(&self) -> Result<Arc<OnCallRoster>> {
        self.build_roster()
            .instrument(info_span!("refresh_roster"))
            .await
    }

    async fn build_roster(&self) -> Result<Arc<OnCallRoster>> {
        let since = self.calendar.now().with_timezone(&Utc);
        let until = since + TimeDelta::seconds(ROSTER_SAMPLE_SECONDS);
        let schedule_ids = self.provider.list_schedule_ids().await?;

        let mut users: Vec<OnCallUser> = Vec::new();
        for schedule_id in &schedule_ids {
            let scheduled = self
                .provider
                .list_on_call_users(schedule_id, since, until)
                .await?;
            for user in scheduled {
                if users.iter().any(|known| known.user_id == user.id) {
                    continue;
                }
                let phone = self
                    .provider
                    .get_user_contact_methods(&user.id)
                    .await?
                    .into_iter()
                    .find(ContactMethod::is_phone)
                    .map(|method| method.address);
                users.push(OnCallUser {
                    user_id: user.id,
                    name: user.name,
                    team: user.team,
                    phone,
                });
            }
        }

        let roster = Arc::new(OnCallRoster {
            users,
            refreshed_at: since,
        });
        self.roster.replace(Arc::clone(&roster));
        info!(
            schedules = schedule_ids.len(),
            users = roster.users.len(),
            "on-call roster refreshed"
        );
        Ok(roster)
    }

    /// Reply listing who is on call, grouped by team.
    ///
    /// Uses the cached roster, refreshing it first when it is empty.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the cache was empty and the refresh failed.
    pub async fn current_on_call_message(&self) -> Result<String> {
        let mut roster = self.roster.snapshot();
        if roster.is_empty() {
            roster = self.refresh_roster().await?;
        }
        Ok(format_roster(&roster))
    }

    /// The billing window of the cycle that closed last month.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the boundary does not exist locally.
    pub fn current_billing_window(&self) -> Result<BillingWindow> {
        report::billing_window(self.calendar.now())
    }

    /// Compile the report for the cycle that closed last month.
    ///
    /// # Errors
    ///
    /// Returns the first provider error; no partial report is produced.
    pub async fn compile_report(&self) -> Result<CompensationReport> {
        let window = self.current_billing_window()?;
        self.compile_report_for_window(window).await
    }

    /// Compile the report for an explicit window.
    ///
    /// # Errors
    ///
    /// Returns the first provider error; no partial report is produced.
    pub async fn compile_report_for_window(
        &self,
        window: BillingWindow,
    ) -> Result<CompensationReport> {
        self.build_report(window)
            .instrument(info_span!("compile_report"))
            .await
    }

    async fn build_report(&self, window: BillingWindow) -> Result<CompensationReport> {
        let schedule_ids = self.provider.list_schedule_ids().await?;
        let schedules =
            fanout::fetch_schedule_details(Arc::clone(&self.provider), &schedule_ids).await?;
        let intervals = self
            .provider
            .list_on_call_intervals(window.from, window.until, &schedule_ids)
            .await?;

        let lines = report::compile_lines(&intervals, &window, self.weekly_rate);
        info!(
            fetched = intervals.len(),
            billed = lines.len(),
            "compensation report compiled"
        );

        Ok(CompensationReport {
            window,
            schedules,
            lines,
            tz: self.calendar.timezone(),
        })
    }
}

/// Render a roster as one line per user, grouped by team label.
///
/// Users without a team come first, without a heading. A missing phone
/// number leaves the field after the colon empty.
#[must_use]
pub fn format_roster(roster: &OnCallRoster) -> String {
    if roster.is_empty() {
        return "Nobody is on call right now.".to_owned();
    }

    let mut groups: Vec<(Option<&str>, Vec<&OnCallUser>)> = Vec::new();
    for user in &roster.users {
        let team = user.team.as_deref();
        match groups.iter_mut().find(|(label, _)| *label == team) {
            Some((_, members)) => members.push(user),
            None => groups.push((team, vec![user])),
        }
    }
    groups.sort_by_key(|(label, _)| label.is_some());

    let mut text = String::from("Currently on call:\n");
    for (label, members) in groups {
        if let Some(label) = label {
            let _ = writeln!(text, "*{label}*");
        }
        for user in members {
            let _ = writeln!(
                text,
                "• {}: {}",
                user.name,
                user.phone.as_deref().unwrap_or_default()
            );
        }
    }
    text
}
