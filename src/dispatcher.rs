//! Message dispatcher: routes classified intents to replies and runs the
//! scheduled broadcasts.
//!
//! Inbound messages are handled one at a time, in arrival order, by the loop
//! started with [`spawn_message_loop`]. Every outgoing message carries a
//! random footer. Failures are logged; replies never contain error text.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GlobalConfig;
use crate::flavor::Picker;
use crate::intent::{Intent, IntentClassifier};
use crate::lunch::LunchCatalog;
use crate::models::message::InboundMessage;
use crate::oncall::OnCallService;
use crate::transport::ChatTransport;
use crate::Result;

/// Reply to a help request.
pub const HELP_TEXT: &str = "Need my help? Ask for lunch by asking along the lines of:\n\
> Mollie what's for lunch today\n\
> What are we having for lunch this week mollie\n\
Or ask who is on call:\n\
> Mollie who is on call?\n\
Or try asking me that in dutch, I'll probably listen.\n\
\n\
Suggestions, bugs? Create an issue on <https://github.com/wvdeutekom/molliebot|github.com>";

/// Reply when the on-call integration is switched off.
pub const ON_CALL_DISABLED: &str = "I don't keep track of who is on call here.";

/// Reply when the on-call roster cannot be fetched.
pub const ON_CALL_UNAVAILABLE: &str =
    "I can't reach the on-call schedule right now, try again in a bit.";

/// Reply to a request to leave.
#[must_use]
pub fn go_away_reply(name: &str) -> String {
    format!("I'm sorry {name}, I'm afraid I can't do that")
}

/// Append the decorative footer to a message body.
#[must_use]
pub fn with_footer(text: &str, footer: &str) -> String {
    format!("{text}\n\n{footer}\n")
}

/// Channel and footer settings the dispatcher needs from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Only answer in `restricted_channels` when set.
    pub restrict_to_config_channels: bool,
    /// Allowed channels when restricted; also the lunch broadcast targets.
    pub restricted_channels: Vec<String>,
    /// Channels receiving the compensation report.
    pub report_channels: Vec<String>,
    /// Footer pool.
    pub footers: Vec<String>,
}

impl DispatcherSettings {
    /// Extract the dispatcher's settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            restrict_to_config_channels: config.restrict_to_config_channels,
            restricted_channels: config.restricted_channels.clone(),
            report_channels: config.oncall.report_channels.clone(),
            footers: config.footers(),
        }
    }

    fn is_channel_allowed(&self, channel_id: &str) -> bool {
        !self.restrict_to_config_channels
            || self.restricted_channels.iter().any(|id| id == channel_id)
    }
}

/// Routes inbound messages and scheduled broadcasts to the transport.
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    classifier: IntentClassifier,
    lunch: LunchCatalog,
    oncall: Option<Arc<OnCallService>>,
    picker: Arc<dyn Picker>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    /// Assemble a dispatcher. `oncall` is `None` when the integration is off.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        classifier: IntentClassifier,
        lunch: LunchCatalog,
        oncall: Option<Arc<OnCallService>>,
        picker: Arc<dyn Picker>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            transport,
            classifier,
            lunch,
            oncall,
            picker,
            settings,
        }
    }

    /// The on-call service, when enabled.
    #[must_use]
    pub fn oncall(&self) -> Option<&Arc<OnCallService>> {
        self.oncall.as_ref()
    }

    fn footer(&self) -> String {
        let pool: Vec<&str> = self.settings.footers.iter().map(String::as_str).collect();
        self.picker.pick(&pool).to_owned()
    }

    /// Post `text` plus a footer. Failures are logged, not retried.
    async fn send(&self, channel_id: &str, text: &str) -> bool {
        let body = with_footer(text, &self.footer());
        match self.transport.send_message(channel_id, &body).await {
            Ok(sent) => {
                debug!(channel_id = %sent.channel_id, ts = %sent.ts, "message sent");
                true
            }
            Err(err) => {
                error!(channel_id, %err, "failed to send message");
                false
            }
        }
    }

    /// Handle one inbound message and return how many replies were sent.
    pub async fn handle_message(&self, message: &InboundMessage) -> usize {
        if message.from_bot {
            debug!(channel_id = %message.channel_id, "ignoring bot message");
            return 0;
        }
        if !self.settings.is_channel_allowed(&message.channel_id) {
            debug!(channel_id = %message.channel_id, "ignoring message outside configured channels");
            return 0;
        }

        let text = self
            .classifier
            .resolve_mentions(&message.text, self.transport.as_ref())
            .await;
        let direct = self.transport.is_direct_message_channel(&message.channel_id);
        let classification = self.classifier.classify(&text, direct);
        if classification.is_no_match() {
            return 0;
        }

        let mut sent = 0;
        for intent in &classification.intents {
            let Some(reply) = self.reply_for(*intent, message).await else {
                continue;
            };
            if self.send(&message.channel_id, &reply).await {
                sent += 1;
            }
        }
        info!(
            channel_id = %message.channel_id,
            intents = ?classification.intents,
            sent,
            "answered message"
        );
        sent
    }

    async fn reply_for(&self, intent: Intent, message: &InboundMessage) -> Option<String> {
        match intent {
            Intent::Help => Some(HELP_TEXT.to_owned()),
            Intent::GoAway => Some(go_away_reply(&self.user_name(&message.user_id).await)),
            Intent::LunchToday => Some(self.lunch.format_today_message(false)),
            Intent::LunchThisWeek => Some(self.lunch.format_week_message(false)),
            Intent::OnCallStatus => Some(self.on_call_reply().await),
            Intent::NoMatch => None,
        }
    }

    async fn user_name(&self, user_id: &str) -> String {
        match self.transport.resolve_user_name(user_id).await {
            Ok(name) => name,
            Err(err) => {
                warn!(user_id, %err, "failed to resolve user name");
                format!("<@{user_id}>")
            }
        }
    }

    async fn on_call_reply(&self) -> String {
        let Some(oncall) = &self.oncall else {
            return ON_CALL_DISABLED.to_owned();
        };
        match oncall.current_on_call_message().await {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "on-call lookup failed");
                ON_CALL_UNAVAILABLE.to_owned()
            }
        }
    }

    /// Post today's lunch, with a greeting, to every target channel.
    ///
    /// Without channel restriction the targets are every channel the bot has
    /// joined. With `restrict_to_config_channels` set, the broadcast is
    /// narrowed to `restricted_channels`, the same set the bot answers in,
    /// and the joined channels are not listed at all. Returns how many posts
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the joined channels cannot be listed.
    pub async fn broadcast_lunch_today(&self) -> Result<usize> {
        let channels = if self.settings.restrict_to_config_channels {
            self.settings.restricted_channels.clone()
        } else {
            self.transport.list_joined_channel_ids().await?
        };
        let text = self.lunch.format_today_message(true);
        let sent = self.broadcast(&channels, &text).await;
        info!(channels = channels.len(), sent, "lunch broadcast finished");
        Ok(sent)
    }

    /// Compile last month's compensation report and post it to the report
    /// channels. Returns how many posts succeeded.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the report cannot be compiled; nothing
    /// is posted in that case.
    pub async fn broadcast_compensation_report(&self) -> Result<usize> {
        let Some(oncall) = &self.oncall else {
            debug!("on-call disabled, skipping compensation report");
            return Ok(0);
        };
        if self.settings.report_channels.is_empty() {
            warn!("no report channels configured, skipping compensation report");
            return Ok(0);
        }

        let report = oncall.compile_report().await?;
        let sent = self
            .broadcast(&self.settings.report_channels, &report.render())
            .await;
        info!(
            lines = report.lines.len(),
            total = report.total_amount(),
            sent,
            "compensation report posted"
        );
        Ok(sent)
    }

    /// Refresh the cached on-call roster, if the integration is enabled.
    ///
    /// # Errors
    ///
    /// Returns the provider error; the previous roster stays cached.
    pub async fn refresh_roster(&self) -> Result<()> {
        if let Some(oncall) = &self.oncall {
            oncall.refresh_roster().await?;
        }
        Ok(())
    }

    async fn broadcast(&self, channels: &[String], text: &str) -> usize {
        join_all(channels.iter().map(|channel| self.send(channel, text)))
            .await
            .into_iter()
            .filter(|sent| *sent)
            .count()
    }
}

/// Spawn the sequential inbound message loop.
///
/// Each message is handled under `handler_timeout`; a message that runs
/// over is abandoned and the loop moves on.
#[must_use]
pub fn spawn_message_loop(
    dispatcher: Arc<Dispatcher>,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
    cancel: CancellationToken,
    handler_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("message loop shutting down");
                    break;
                }
                received = inbound_rx.recv() => {
                    let Some(message) = received else {
                        info!("inbound channel closed");
                        break;
                    };
                    let handled =
                        tokio::time::timeout(handler_timeout, dispatcher.handle_message(&message))
                            .await;
                    if handled.is_err() {
                        warn!(
                            channel_id = %message.channel_id,
                            timeout_secs = handler_timeout.as_secs(),
                            "message handling timed out"
                        );
                    }
                }
            }
        }
    })
}
