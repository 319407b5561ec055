//! Slack Socket Mode client and Web API transport.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsListRequest, SlackApiToken,
    SlackApiTokenType, SlackApiTokenValue, SlackApiUsersInfoRequest, SlackChannelId, SlackClient,
    SlackClientEventsListenerEnvironment, SlackClientHyperHttpsConnector, SlackClientSession,
    SlackClientSocketModeConfig, SlackClientSocketModeListener, SlackConversationType,
    SlackMessageContent, SlackSocketModeListenerCallbacks, SlackUserId,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::models::message::{InboundMessage, SentMessage};
use crate::slack::events;
use crate::transport::{ChatTransport, TransportFuture};
use crate::{config::SlackConfig, AppError, Result};

/// Page size for `conversations.list`.
const CHANNEL_PAGE_LIMIT: u16 = 200;

/// Build a plain-text `chat.postMessage` request posted as the bot user.
fn post_request(channel: &str, text: &str) -> SlackApiChatPostMessageRequest {
    SlackApiChatPostMessageRequest::new(
        SlackChannelId(channel.to_owned()),
        SlackMessageContent::new().with_text(text.to_owned()),
    )
    .with_as_user(true)
    .with_link_names(true)
}

/// Slack Socket Mode wrapper that also serves as the bot's [`ChatTransport`].
pub struct SlackService {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    request_timeout: Duration,
}

/// Join handle for the Socket Mode listener task.
pub struct SlackRuntime {
    /// Listener task; ends when the socket connection is closed for good.
    pub socket_task: JoinHandle<()>,
}

impl SlackService {
    /// Start the Slack client and the Socket Mode listener.
    ///
    /// Every channel message received over the socket is forwarded to
    /// `inbound_tx`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn start(
        config: &SlackConfig,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Result<(Self, SlackRuntime)> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };
        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.app_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };

        let socket_task = Self::spawn_socket_mode(&client, app_token, inbound_tx);

        info!("slack service started in socket mode");

        Ok((
            Self {
                client,
                bot_token,
                request_timeout: config.request_timeout(),
            },
            SlackRuntime { socket_task },
        ))
    }

    fn spawn_socket_mode(
        client: &Arc<SlackClient<SlackClientHyperHttpsConnector>>,
        app_token: SlackApiToken,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> JoinHandle<()> {
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(client))
                .with_error_handler(|err, _client, _state| {
                    error!(?err, "socket mode error");
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR
                })
                .with_user_state(inbound_tx),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(|event, _client, _state| async move {
                info!(?event, "socket hello");
            })
            .with_push_events(events::handle_push_event);
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }

            listener.serve().await;
            info!("socket mode listener exited");
        })
    }

    /// Create an HTTP session for direct API calls using the bot token.
    #[must_use]
    pub fn http_session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }

    /// Run one Web API call under the request timeout.
    async fn bounded<T, E, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "slack {operation} exceeded {}s",
                    self.request_timeout.as_secs()
                ))
            })?
            .map_err(|err| AppError::Slack(format!("{operation} failed: {err}")))
    }

    async fn post(&self, channel_id: String, text: String) -> Result<SentMessage> {
        let request = post_request(&channel_id, &text);
        let session = self.http_session();
        let response = self
            .bounded("chat.postMessage", session.chat_post_message(&request))
            .await?;
        debug!(%channel_id, ts = %response.ts.0, "sent slack message");
        Ok(SentMessage {
            channel_id: response.channel.0,
            ts: response.ts.0,
        })
    }

    async fn user_name(&self, user_id: String) -> Result<String> {
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.clone()));
        let session = self.http_session();
        let response = self.bounded("users.info", session.users_info(&request)).await?;
        Ok(response
            .user
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or(user_id))
    }

    /// Public channels the bot is a member of, plus every private channel
    /// visible to it.
    async fn joined_channel_ids(&self) -> Result<Vec<String>> {
        let session = self.http_session();
        let mut ids = Vec::new();
        let mut cursor = None;
        loop {
            let mut request = SlackApiConversationsListRequest::new()
                .with_exclude_archived(true)
                .with_limit(CHANNEL_PAGE_LIMIT)
                .with_types(vec![
                    SlackConversationType::Public,
                    SlackConversationType::Private,
                ]);
            request.cursor = cursor.take();

            let response = self
                .bounded("conversations.list", session.conversations_list(&request))
                .await?;
            ids.extend(
                response
                    .channels
                    .into_iter()
                    .filter(|channel| {
                        channel.flags.is_private.unwrap_or(false)
                            || channel.flags.is_member.unwrap_or(false)
                    })
                    .map(|channel| channel.id.0),
            );

            cursor = response
                .response_metadata
                .and_then(|meta| meta.next_cursor)
                .filter(|next| !next.0.is_empty());
            if cursor.is_none() {
                debug!(channels = ids.len(), "listed joined channels");
                return Ok(ids);
            }
        }
    }
}

impl ChatTransport for SlackService {
    fn send_message(&self, channel_id: &str, text: &str) -> TransportFuture<'_, SentMessage> {
        let channel_id = channel_id.to_owned();
        let text = text.to_owned();
        Box::pin(self.post(channel_id, text))
    }

    fn resolve_user_name(&self, user_id: &str) -> TransportFuture<'_, String> {
        let user_id = user_id.to_owned();
        Box::pin(self.user_name(user_id))
    }

    fn list_joined_channel_ids(&self) -> TransportFuture<'_, Vec<String>> {
        Box::pin(self.joined_channel_ids())
    }
}
