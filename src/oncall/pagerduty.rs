//! `PagerDuty` REST v2 client.
//!
//! Implements [`OnCallProvider`] over plain HTTPS with `reqwest`. List
//! endpoints are walked with offset paging until the API reports no more
//! results. Response bodies are decoded through the `parse_*` helpers so the
//! wire format can be exercised without a live account.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::OnCallConfig;
use crate::models::oncall::{ContactMethod, OnCallInterval, ScheduleDetail, ScheduledUser};
use crate::{AppError, Result};

use super::provider::{OnCallProvider, ProviderFuture};

/// Media type selecting API version 2.
const ACCEPT_V2: &str = "application/vnd.pagerduty+json;version=2";

/// Page size for list endpoints.
const PAGE_LIMIT: u32 = 100;

/// Shared `{ id, summary }` reference object.
#[derive(Debug, Clone, Deserialize)]
struct ApiReference {
    id: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiScheduleRef {
    id: String,
}

/// One page of `GET /schedules`.
#[derive(Debug, Deserialize)]
struct SchedulesPage {
    #[serde(default)]
    schedules: Vec<ApiScheduleRef>,
    #[serde(default)]
    more: bool,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    teams: Vec<ApiReference>,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiOnCall {
    user: ApiReference,
    #[serde(default)]
    schedule: Option<ApiReference>,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

/// One page of `GET /oncalls`.
#[derive(Debug, Deserialize)]
struct OnCallsPage {
    #[serde(default)]
    oncalls: Vec<ApiOnCall>,
    #[serde(default)]
    more: bool,
}

#[derive(Debug, Deserialize)]
struct ApiContactMethod {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    country_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContactMethodsResponse {
    #[serde(default)]
    contact_methods: Vec<ApiContactMethod>,
}

#[derive(Debug, Deserialize)]
struct ApiSchedule {
    id: String,
    name: String,
    #[serde(default)]
    time_zone: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    schedule: ApiSchedule,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|err| AppError::Provider(format!("unexpected response body: {err}")))
}

/// Decode one page of `GET /schedules` into schedule ids and the `more` flag.
///
/// # Errors
///
/// Returns `AppError::Provider` if the body does not match the expected shape.
pub fn parse_schedule_page(body: &str) -> Result<(Vec<String>, bool)> {
    let page: SchedulesPage = decode(body)?;
    Ok((
        page.schedules.into_iter().map(|schedule| schedule.id).collect(),
        page.more,
    ))
}

/// Decode `GET /schedules/{id}/users`.
///
/// The display name falls back to the summary and then to the id; the team
/// is the first team listed.
///
/// # Errors
///
/// Returns `AppError::Provider` if the body does not match the expected shape.
pub fn parse_schedule_users(body: &str) -> Result<Vec<ScheduledUser>> {
    let response: UsersResponse = decode(body)?;
    Ok(response
        .users
        .into_iter()
        .map(|user| {
            let name = user
                .name
                .or(user.summary)
                .unwrap_or_else(|| user.id.clone());
            let team = user
                .teams
                .into_iter()
                .next()
                .map(|team| team.summary.unwrap_or(team.id));
            ScheduledUser {
                id: user.id,
                name,
                team,
            }
        })
        .collect())
}

/// Decode one page of `GET /oncalls` into shifts and the `more` flag.
///
/// Entries without a schedule or without both bounds are open-ended or
/// policy-level assignments and are dropped.
///
/// # Errors
///
/// Returns `AppError::Provider` if the body does not match the expected shape.
pub fn parse_oncalls_page(body: &str) -> Result<(Vec<OnCallInterval>, bool)> {
    let page: OnCallsPage = decode(body)?;
    let intervals = page
        .oncalls
        .into_iter()
        .filter_map(|oncall| {
            let (Some(schedule), Some(start), Some(end)) =
                (oncall.schedule, oncall.start, oncall.end)
            else {
                debug!(user_id = %oncall.user.id, "skipping unbounded on-call entry");
                return None;
            };
            Some(OnCallInterval {
                schedule_id: schedule.id,
                user_name: oncall
                    .user
                    .summary
                    .unwrap_or_else(|| oncall.user.id.clone()),
                user_id: oncall.user.id,
                team_summary: schedule.summary,
                start,
                end,
            })
        })
        .collect();
    Ok((intervals, page.more))
}

/// Decode `GET /users/{id}/contact_methods`.
///
/// Phone and SMS addresses are prefixed with `+<country code> ` when the
/// provider reports one.
///
/// # Errors
///
/// Returns `AppError::Provider` if the body does not match the expected shape.
pub fn parse_contact_methods(body: &str) -> Result<Vec<ContactMethod>> {
    let response: ContactMethodsResponse = decode(body)?;
    Ok(response
        .contact_methods
        .into_iter()
        .map(|method| {
            let address = match method.country_code {
                Some(code)
                    if method.kind.starts_with("phone") || method.kind.starts_with("sms") =>
                {
                    format!("+{code} {}", method.address)
                }
                _ => method.address,
            };
            ContactMethod {
                kind: method.kind,
                address,
            }
        })
        .collect())
}

/// Decode `GET /schedules/{id}`.
///
/// # Errors
///
/// Returns `AppError::Provider` if the body does not match the expected shape.
pub fn parse_schedule(body: &str) -> Result<ScheduleDetail> {
    let response: ScheduleResponse = decode(body)?;
    let schedule = response.schedule;
    Ok(ScheduleDetail {
        id: schedule.id,
        name: schedule.name,
        time_zone: schedule.time_zone,
        description: schedule.description.filter(|text| !text.is_empty()),
    })
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// HTTP client for the `PagerDuty` REST API.
pub struct PagerDutyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PagerDutyClient {
    /// Build a client from the on-call configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the API key is missing or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &OnCallConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::Config("PagerDuty API key is not set".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}{path}", self.base_url), params)
            .map_err(|err| AppError::Config(format!("invalid PagerDuty url: {err}")))
    }

    async fn get_body(&self, path: &str, params: &[(String, String)]) -> Result<String> {
        let url = self.url(path, params)?;
        debug!(path, "PagerDuty request");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Token token={}", self.api_key))
            .header(ACCEPT, ACCEPT_V2)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Provider(format!("{path} returned {status}")));
        }
        Ok(response.text().await?)
    }

    async fn fetch_schedule_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut offset: u32 = 0;
        loop {
            let params = vec![
                ("limit".to_owned(), PAGE_LIMIT.to_string()),
                ("offset".to_owned(), offset.to_string()),
            ];
            let (page, more) = parse_schedule_page(&self.get_body("/schedules", &params).await?)?;
            let fetched = u32::try_from(page.len()).unwrap_or(u32::MAX);
            ids.extend(page);
            if !more || fetched == 0 {
                return Ok(ids);
            }
            offset = offset.saturating_add(fetched);
        }
    }

    async fn fetch_intervals(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        schedule_ids: &[String],
    ) -> Result<Vec<OnCallInterval>> {
        let mut intervals: Vec<OnCallInterval> = Vec::new();
        let mut offset: u32 = 0;
        loop {
            let mut params = vec![
                ("since".to_owned(), format_instant(since)),
                ("until".to_owned(), format_instant(until)),
                ("limit".to_owned(), PAGE_LIMIT.to_string()),
                ("offset".to_owned(), offset.to_string()),
            ];
            params.extend(
                schedule_ids
                    .iter()
                    .map(|id| ("schedule_ids[]".to_owned(), id.clone())),
            );

            let (page, more) = parse_oncalls_page(&self.get_body("/oncalls", &params).await?)?;
            let fetched = u32::try_from(page.len()).unwrap_or(u32::MAX);
            // One shift shows up once per escalation level it is attached to.
            for interval in page {
                let seen = intervals.iter().any(|known| {
                    known.schedule_id == interval.schedule_id
                        && known.user_id == interval.user_id
                        && known.start == interval.start
                        && known.end == interval.end
                });
                if !seen {
                    intervals.push(interval);
                }
            }
            if !more || fetched == 0 {
                return Ok(intervals);
            }
            offset = offset.saturating_add(fetched);
        }
    }
}

impl OnCallProvider for PagerDutyClient {
    fn list_schedule_ids(&self) -> ProviderFuture<'_, Vec<String>> {
        Box::pin(self.fetch_schedule_ids())
    }

    fn list_on_call_users(
        &self,
        schedule_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> ProviderFuture<'_, Vec<ScheduledUser>> {
        let path = format!("/schedules/{schedule_id}/users");
        Box::pin(async move {
            let params = vec![
                ("since".to_owned(), format_instant(since)),
                ("until".to_owned(), format_instant(until)),
            ];
            parse_schedule_users(&self.get_body(&path, &params).await?)
        })
    }

    fn list_on_call_intervals(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        schedule_ids: &[String],
    ) -> ProviderFuture<'_, Vec<OnCallInterval>> {
        let schedule_ids = schedule_ids.to_vec();
        Box::pin(async move {
            if schedule_ids.is_empty() {
                return Ok(Vec::new());
            }
            self.fetch_intervals(since, until, &schedule_ids).await
        })
    }

    fn get_user_contact_methods(&self, user_id: &str) -> ProviderFuture<'_, Vec<ContactMethod>> {
        let path = format!("/users/{user_id}/contact_methods");
        Box::pin(async move { parse_contact_methods(&self.get_body(&path, &[]).await?) })
    }

    fn get_schedule(&self, schedule_id: &str) -> ProviderFuture<'_, ScheduleDetail> {
        let path = format!("/schedules/{schedule_id}");
        Box::pin(async move { parse_schedule(&self.get_body(&path, &[]).await?) })
    }
}
