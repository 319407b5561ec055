//! Socket Mode push event handling.
//!
//! Channel messages are converted to [`InboundMessage`] and handed to the
//! dispatcher over the channel stored in the listener's user state. The
//! callback itself never replies, so Socket Mode acks stay fast.

use std::sync::Arc;

use slack_morphism::prelude::{
    SlackClient, SlackClientEventsUserState, SlackClientHyperHttpsConnector,
    SlackEventCallbackBody, SlackMessageEvent, SlackMessageEventType, SlackPushEventCallback,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::message::InboundMessage;

/// Whether a message subtype still carries text a person typed.
///
/// File shares, thread broadcasts and `/me` messages do; edits, deletions,
/// joins and other system notices do not.
#[must_use]
pub fn is_authored_subtype(subtype: &SlackMessageEventType) -> bool {
    matches!(
        subtype,
        SlackMessageEventType::FileShare
            | SlackMessageEventType::ThreadBroadcast
            | SlackMessageEventType::MeMessage
    )
}

/// Convert a message event into the dispatcher's input.
///
/// System subtypes from people (edits, deletions, joins) are dropped, as are
/// messages without a channel, author, or text. Bot messages pass through
/// flagged so the dispatcher can log and ignore them.
#[must_use]
pub fn message_to_inbound(event: &SlackMessageEvent) -> Option<InboundMessage> {
    let from_bot = event.sender.bot_id.is_some();
    if let Some(subtype) = &event.subtype {
        if !from_bot && !is_authored_subtype(subtype) {
            debug!(?subtype, "ignoring message subtype");
            return None;
        }
    }

    let channel_id = event.origin.channel.as_ref()?.0.clone();
    let text = event
        .content
        .as_ref()
        .and_then(|content| content.text.clone())
        .filter(|text| !text.trim().is_empty())?;
    let user_id = event
        .sender
        .user
        .as_ref()
        .map(|user| user.0.clone())
        .unwrap_or_default();
    if user_id.is_empty() && !from_bot {
        return None;
    }

    Some(InboundMessage {
        channel_id,
        user_id,
        text,
        from_bot,
    })
}

/// Handle push events delivered via Socket Mode.
///
/// # Errors
///
/// Never fails; a closed dispatcher channel is logged and the event dropped.
pub async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::UserCallbackResult<()> {
    let SlackEventCallbackBody::Message(message) = &event.event else {
        debug!("push event ignored");
        return Ok(());
    };
    let Some(inbound) = message_to_inbound(message) else {
        return Ok(());
    };

    let sender: Option<mpsc::Sender<InboundMessage>> = {
        let guard = state.read().await;
        guard.get_user_state::<mpsc::Sender<InboundMessage>>().cloned()
    };
    let Some(sender) = sender else {
        warn!("dispatcher channel not registered; dropping message");
        return Ok(());
    };

    if sender.send(inbound).await.is_err() {
        warn!("dispatcher channel closed; dropping message");
    }
    Ok(())
}
