//! Chat message models passed between the Slack layer and the dispatcher.

/// A message posted in a channel the bot can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel (or DM conversation) the message was posted in.
    pub channel_id: String,
    /// Author's user id.
    pub user_id: String,
    /// Raw message text, including `<@U…>` mention markup.
    pub text: String,
    /// Whether the author is a bot integration rather than a person.
    pub from_bot: bool,
}

/// Confirmation returned by the transport after posting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Channel the message landed in.
    pub channel_id: String,
    /// Message timestamp, which doubles as its id.
    pub ts: String,
}
