//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use tokio_cron_scheduler::Job;
use tracing::warn;

use crate::flavor::DEFAULT_FOOTERS;
use crate::models::lunch::{LunchEntry, RawLunchEntry};
use crate::{AppError, Result};

/// OS keychain service holding the bot's secrets.
const KEYCHAIN_SERVICE: &str = "molliebot";

/// Nested Slack configuration for Socket Mode connectivity.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// not from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Upper bound for a single Slack Web API call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Upper bound for handling one inbound message end to end.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_seconds: u64,
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Bot user token used for posting messages (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            handler_timeout_seconds: default_handler_timeout(),
            app_token: String::new(),
            bot_token: String::new(),
        }
    }
}

impl SlackConfig {
    /// Slack Web API request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Per-message handling timeout.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }
}

/// On-call provider and compensation report settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct OnCallConfig {
    /// Whether the `PagerDuty` integration is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Channels receiving the monthly compensation report.
    #[serde(default)]
    pub report_channels: Vec<String>,
    /// Compensation paid per full week of on-call coverage.
    #[serde(default = "default_weekly_rate")]
    pub weekly_rate: f64,
    /// `PagerDuty` REST API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound for a single provider request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for OnCallConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            report_channels: Vec::new(),
            weekly_rate: default_weekly_rate(),
            api_base_url: default_api_base_url(),
            request_timeout_seconds: default_request_timeout(),
            api_key: String::new(),
        }
    }
}

impl OnCallConfig {
    /// Provider request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Timer settings. Cron expressions use the six-field
/// `sec min hour day-of-month month day-of-week` form.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NotificationConfig {
    /// When to broadcast today's lunch to every joined channel.
    #[serde(default)]
    pub lunch_times: Vec<String>,
    /// When to post the compensation report.
    #[serde(default)]
    pub report_times: Vec<String>,
    /// Interval between on-call roster refreshes.
    #[serde(default = "default_roster_refresh")]
    pub roster_refresh_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            lunch_times: Vec::new(),
            report_times: Vec::new(),
            roster_refresh_seconds: default_roster_refresh(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    10
}

fn default_handler_timeout() -> u64 {
    60
}

fn default_weekly_rate() -> f64 {
    150.0
}

fn default_api_base_url() -> String {
    "https://api.pagerduty.com".into()
}

fn default_roster_refresh() -> u64 {
    300
}

fn default_bot_names() -> Vec<String> {
    vec!["mollie".into(), "molliebot".into()]
}

fn default_timezone() -> String {
    "Europe/Amsterdam".into()
}

fn default_zone() -> Tz {
    chrono_tz::Europe::Amsterdam
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Names the bot answers to at the start or end of a message.
    #[serde(default = "default_bot_names")]
    pub bot_names: Vec<String>,
    /// IANA timezone defining "today" and the report billing boundary.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Only answer in `restricted_channels` when set.
    #[serde(default)]
    pub restrict_to_config_channels: bool,
    /// Channels the bot is allowed to answer in when restricted.
    #[serde(default)]
    pub restricted_channels: Vec<String>,
    /// Raise the default log level to `debug`.
    #[serde(default)]
    pub verbose_logging: bool,
    /// Footer pool override; the built-in emoji set is used when empty.
    #[serde(default)]
    pub footers: Vec<String>,
    /// Slack connectivity settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// On-call integration settings.
    #[serde(default)]
    pub oncall: OnCallConfig,
    /// Timer settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Lunch entries as written in the file.
    #[serde(default, rename = "lunch")]
    pub raw_lunch: Vec<RawLunchEntry>,
    /// Parsed lunch entries (populated by validation).
    #[serde(skip)]
    pub lunches: Vec<LunchEntry>,
    /// Parsed reference timezone (populated by validation).
    #[serde(skip, default = "default_zone")]
    pub zone: Tz,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails, including
    /// any lunch entry whose date is not `YYYY-MM-DD`.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load Slack and `PagerDuty` credentials from OS keychain with env-var
    /// fallback.
    ///
    /// The `PagerDuty` key is only required when the on-call integration is
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required credential is missing from
    /// both the keychain and the environment.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.app_token = load_credential("slack_app_token", "SLACK_APP_TOKEN").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        if self.oncall.enabled {
            self.oncall.api_key =
                load_credential("pagerduty_api_key", "PAGERDUTY_API_KEY").await?;
        }
        Ok(())
    }

    /// Footer pool, falling back to the built-in emoji set.
    #[must_use]
    pub fn footers(&self) -> Vec<String> {
        if self.footers.is_empty() {
            DEFAULT_FOOTERS.iter().map(|f| (*f).to_owned()).collect()
        } else {
            self.footers.clone()
        }
    }

    fn validate(&mut self) -> Result<()> {
        self.bot_names.retain(|name| !name.trim().is_empty());
        if self.bot_names.is_empty() {
            return Err(AppError::Config("bot_names must not be empty".into()));
        }

        self.zone = self
            .timezone
            .parse::<Tz>()
            .map_err(|err| AppError::Config(format!("invalid timezone '{}': {err}", self.timezone)))?;

        if self.notifications.roster_refresh_seconds == 0 {
            return Err(AppError::Config(
                "roster_refresh_seconds must be greater than zero".into(),
            ));
        }

        for expression in &self.notifications.lunch_times {
            check_cron("notifications.lunch_times", expression, self.zone)?;
        }
        for expression in &self.notifications.report_times {
            check_cron("notifications.report_times", expression, self.zone)?;
        }

        if !self.oncall.weekly_rate.is_finite() || self.oncall.weekly_rate < 0.0 {
            return Err(AppError::Config(
                "oncall.weekly_rate must be a non-negative number".into(),
            ));
        }

        self.lunches = self
            .raw_lunch
            .iter()
            .map(|raw| {
                LunchEntry::try_from(raw).map_err(|err| {
                    AppError::Config(format!(
                        "invalid lunch entry '{}': {err}",
                        raw.description
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(())
    }
}

/// Reject a cron expression the scheduler would refuse at startup.
fn check_cron(field: &str, expression: &str, zone: Tz) -> Result<()> {
    Job::new_async_tz(expression, zone, |_uuid, _l| Box::pin(async {}))
        .map(|_| ())
        .map_err(|err| AppError::Config(format!("invalid {field} entry '{expression}': {err}")))
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYCHAIN_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain service {KEYCHAIN_SERVICE} or {env_key} env var"
        ))),
    }
}
