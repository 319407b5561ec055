#![forbid(unsafe_code)]

//! `molliebot`: Slack bot answering lunch and on-call questions.
//!
//! Loads configuration and credentials, connects to Slack over Socket Mode,
//! starts the message loop and the timers, then waits for a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use molliebot::config::GlobalConfig;
use molliebot::dates::Calendar;
use molliebot::dispatcher::{self, Dispatcher, DispatcherSettings};
use molliebot::flavor::{Picker, RandomPicker};
use molliebot::intent::IntentClassifier;
use molliebot::lunch::LunchCatalog;
use molliebot::oncall::pagerduty::PagerDutyClient;
use molliebot::oncall::OnCallService;
use molliebot::scheduler;
use molliebot::slack::client::SlackService;
use molliebot::{AppError, Result};

/// Inbound messages buffered between the socket listener and the dispatcher.
const INBOUND_CAPACITY: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "molliebot", about = "Slack bot for lunch menus and on-call rosters", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = GlobalConfig::load_from_path(&args.config)?;
    init_tracing(args.log_format, config.verbose_logging)?;
    info!(
        config = %args.config.display(),
        lunches = config.lunches.len(),
        "molliebot bootstrap"
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(config))
}

async fn run(mut config: GlobalConfig) -> Result<()> {
    // ── Credentials ─────────────────────────────────────
    config.load_credentials().await?;
    info!("credentials loaded");

    let calendar = Calendar::system(config.zone);
    let picker: Arc<dyn Picker> = Arc::new(RandomPicker);

    // ── On-call integration ─────────────────────────────
    let oncall = if config.oncall.enabled {
        let provider = Arc::new(PagerDutyClient::new(&config.oncall)?);
        info!(api = %config.oncall.api_base_url, "on-call integration enabled");
        Some(Arc::new(OnCallService::new(
            provider,
            calendar.clone(),
            config.oncall.weekly_rate,
        )))
    } else {
        info!("on-call integration disabled");
        None
    };

    // ── Slack ───────────────────────────────────────────
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let (slack, slack_runtime) = SlackService::start(&config.slack, inbound_tx).map_err(|err| {
        error!(%err, "slack service start failed");
        err
    })?;

    let lunch = LunchCatalog::new(
        std::mem::take(&mut config.lunches),
        calendar,
        Arc::clone(&picker),
    );
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(slack),
        IntentClassifier::new(&config.bot_names)?,
        lunch,
        oncall,
        picker,
        DispatcherSettings::from_config(&config),
    ));

    // ── Background tasks ────────────────────────────────
    let ct = CancellationToken::new();
    let message_handle = dispatcher::spawn_message_loop(
        Arc::clone(&dispatcher),
        inbound_rx,
        ct.clone(),
        config.slack.handler_timeout(),
    );
    let timers =
        scheduler::start_timers(Arc::clone(&dispatcher), &config.notifications, config.zone, ct.clone())
            .await?;

    info!("molliebot ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Err(err) = timers.shutdown().await {
        error!(%err, "error while stopping timers");
    }
    slack_runtime.socket_task.abort();
    let _ = message_handle.await;
    info!("molliebot shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
