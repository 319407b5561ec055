//! Timers: cron-driven broadcasts and the periodic roster refresh.
//!
//! Lunch and report broadcasts run as `tokio-cron-scheduler` jobs evaluated
//! in the reference timezone. The roster refresh is a plain interval task
//! stopped through the shared cancellation token.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::NotificationConfig;
use crate::dispatcher::Dispatcher;
use crate::{AppError, Result};

/// Running timers; dropped jobs stop with the scheduler.
pub struct Timers {
    scheduler: JobScheduler,
    roster_task: Option<JoinHandle<()>>,
}

impl Timers {
    /// Stop the cron scheduler and wait for the roster task to exit.
    ///
    /// The roster task only exits once the cancellation token passed to
    /// [`start_timers`] is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Scheduler` if the cron scheduler fails to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        if let Some(task) = self.roster_task.take() {
            task.await
                .map_err(|err| AppError::Scheduler(format!("roster task panicked: {err}")))?;
        }
        info!("timers stopped");
        Ok(())
    }
}

fn lunch_job(expression: &str, tz: Tz, dispatcher: Arc<Dispatcher>) -> Result<Job> {
    let job = Job::new_async_tz(expression, tz, move |_uuid, _l| {
        let dispatcher = Arc::clone(&dispatcher);
        Box::pin(async move {
            if let Err(err) = dispatcher.broadcast_lunch_today().await {
                error!(%err, "lunch broadcast failed");
            }
        })
    })
    .map_err(|err| AppError::Scheduler(format!("invalid lunch time '{expression}': {err}")))?;
    Ok(job)
}

fn report_job(expression: &str, tz: Tz, dispatcher: Arc<Dispatcher>) -> Result<Job> {
    let job = Job::new_async_tz(expression, tz, move |_uuid, _l| {
        let dispatcher = Arc::clone(&dispatcher);
        Box::pin(async move {
            if let Err(err) = dispatcher.broadcast_compensation_report().await {
                error!(%err, "compensation report skipped for this cycle");
            }
        })
    })
    .map_err(|err| AppError::Scheduler(format!("invalid report time '{expression}': {err}")))?;
    Ok(job)
}

/// Register every configured broadcast and start the roster refresh.
///
/// Report jobs and the roster refresh are only set up when the dispatcher
/// has an on-call service.
///
/// # Errors
///
/// Returns `AppError::Scheduler` if the scheduler cannot start or a cron
/// expression is invalid.
pub async fn start_timers(
    dispatcher: Arc<Dispatcher>,
    notifications: &NotificationConfig,
    tz: Tz,
    cancel: CancellationToken,
) -> Result<Timers> {
    let scheduler = JobScheduler::new().await?;

    for expression in &notifications.lunch_times {
        scheduler
            .add(lunch_job(expression, tz, Arc::clone(&dispatcher))?)
            .await?;
        info!(%expression, %tz, "lunch broadcast scheduled");
    }

    let roster_task = if dispatcher.oncall().is_some() {
        for expression in &notifications.report_times {
            scheduler
                .add(report_job(expression, tz, Arc::clone(&dispatcher))?)
                .await?;
            info!(%expression, %tz, "compensation report scheduled");
        }
        Some(spawn_roster_refresh(
            Arc::clone(&dispatcher),
            Duration::from_secs(notifications.roster_refresh_seconds),
            cancel,
        ))
    } else {
        None
    };

    scheduler.start().await?;
    Ok(Timers {
        scheduler,
        roster_task,
    })
}

/// Spawn the periodic on-call roster refresh.
///
/// The first refresh runs immediately. A failed refresh is logged and the
/// previous roster stays cached until the next tick.
#[must_use]
pub fn spawn_roster_refresh(
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("roster refresh shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = dispatcher.refresh_roster().await {
                        error!(%err, "on-call roster refresh failed");
                    }
                }
            }
        }
    })
}
