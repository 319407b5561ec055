//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use crate::dates::DateParseError;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing, validation, or credential failure.
    Config(String),
    /// A calendar date could not be parsed.
    DateParse(String),
    /// Slack API or Socket Mode failure.
    Slack(String),
    /// On-call data provider (`PagerDuty`) failure.
    Provider(String),
    /// Cron scheduler setup or registration failure.
    Scheduler(String),
    /// A network call did not complete in time.
    Timeout(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::DateParse(msg) => write!(f, "date parse: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::Provider(msg) => write!(f, "provider: {msg}"),
            Self::Scheduler(msg) => write!(f, "scheduler: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<DateParseError> for AppError {
    fn from(err: DateParseError) -> Self {
        Self::DateParse(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("provider request timed out: {err}"))
        } else {
            Self::Provider(err.to_string())
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for AppError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Self::Scheduler(err.to_string())
    }
}
