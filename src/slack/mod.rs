//! Slack transport: Socket Mode intake and Web API calls.

pub mod client;
pub mod events;
