//! Chat transport abstraction.
//!
//! The [`ChatTransport`] trait decouples the dispatcher from the chat
//! backend. [`SlackService`](crate::slack::client::SlackService) is the
//! production implementation; tests use an in-memory recorder.

use std::future::Future;
use std::pin::Pin;

use crate::models::message::SentMessage;
use crate::Result;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Messaging operations the bot needs from the chat backend.
pub trait ChatTransport: Send + Sync {
    /// Post `text` to `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) if the backend rejects
    /// the message, or [`AppError::Timeout`](crate::AppError::Timeout) if it
    /// does not answer in time.
    fn send_message(&self, channel_id: &str, text: &str) -> TransportFuture<'_, SentMessage>;

    /// Resolve a user id to its display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the user lookup fails; callers keep the raw id.
    fn resolve_user_name(&self, user_id: &str) -> TransportFuture<'_, String>;

    /// Ids of every public and private channel the bot account has joined.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel listing fails.
    fn list_joined_channel_ids(&self) -> TransportFuture<'_, Vec<String>>;

    /// Whether `channel_id` is a direct-message conversation.
    fn is_direct_message_channel(&self, channel_id: &str) -> bool {
        is_direct_message_id(channel_id)
    }
}

/// Direct-message conversation ids are `D` followed by at least eight
/// uppercase alphanumerics.
#[must_use]
pub fn is_direct_message_id(channel_id: &str) -> bool {
    channel_id.strip_prefix('D').is_some_and(|rest| {
        rest.len() >= 8
            && rest
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    })
}
