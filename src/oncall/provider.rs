//! On-call data provider abstraction.
//!
//! [`OnCallProvider`] is the seam between the report compiler and the
//! scheduling service. [`PagerDutyClient`](super::pagerduty::PagerDutyClient)
//! implements it over HTTP; tests use canned in-memory data.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::models::oncall::{ContactMethod, OnCallInterval, ScheduleDetail, ScheduledUser};
use crate::Result;

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Queries the bot needs from the on-call scheduling service.
///
/// Every method fails with [`AppError::Provider`](crate::AppError::Provider)
/// or [`AppError::Timeout`](crate::AppError::Timeout); callers decide whether
/// that is fatal to their operation.
pub trait OnCallProvider: Send + Sync {
    /// Ids of every schedule visible to the API key.
    fn list_schedule_ids(&self) -> ProviderFuture<'_, Vec<String>>;

    /// Users on call for `schedule_id` within `[since, until)`.
    fn list_on_call_users(
        &self,
        schedule_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> ProviderFuture<'_, Vec<ScheduledUser>>;

    /// Every on-call shift overlapping `[since, until]` on the given schedules.
    fn list_on_call_intervals(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        schedule_ids: &[String],
    ) -> ProviderFuture<'_, Vec<OnCallInterval>>;

    /// Contact methods registered for `user_id`.
    fn get_user_contact_methods(&self, user_id: &str) -> ProviderFuture<'_, Vec<ContactMethod>>;

    /// Name and metadata of one schedule.
    fn get_schedule(&self, schedule_id: &str) -> ProviderFuture<'_, ScheduleDetail>;
}
