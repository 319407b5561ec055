//! Free-text intent classification for chat messages.
//!
//! A message is only considered when it is addressed to the bot (one of its
//! names at the very start or end of the text) or sent as a direct message.
//! The bot name is then stripped and the remaining text is tested against an
//! ordered table of keyword patterns. Several intents may fire for one
//! message; the lunch intents are mutually exclusive, with "this week"
//! taking priority over "today".
//!
//! Patterns accept English and Dutch keywords and are case-sensitive.

use std::collections::HashMap;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::transport::ChatTransport;
use crate::{AppError, Result};

/// What the user asked the bot to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Explain what the bot understands.
    Help,
    /// The user wants the bot gone.
    GoAway,
    /// Today's lunch.
    LunchToday,
    /// This week's lunch menu.
    LunchThisWeek,
    /// Who is on call right now.
    OnCallStatus,
    /// Not addressed to the bot, or nothing recognised.
    NoMatch,
}

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Intents in reply order; exactly `[NoMatch]` when nothing applies.
    pub intents: Vec<Intent>,
    /// Message text with the bot name removed.
    pub trimmed_text: String,
}

impl Classification {
    fn no_match(text: &str) -> Self {
        Self {
            intents: vec![Intent::NoMatch],
            trimmed_text: text.to_owned(),
        }
    }

    /// Whether the message needs no reply at all.
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        self.intents.iter().all(|intent| *intent == Intent::NoMatch)
    }
}

const HELP_PATTERN: &str = r"\bhelp\b|\bhulp\b";
const GO_AWAY_PATTERN: &str = r"\bgo\b\s+\baway\b|\bleave\b|\bfuck\b\s+\boff\b|\bga\b\s+\bweg\b";
const ON_CALL_PATTERN: &str = r"\bon[- ]?call\b|\bpiket\b";
const LUNCH_PATTERN: &str = r"\blunch\w*|\beten\b|\beat\w*\b";
const THIS_WEEK_PATTERN: &str = r"\b(?:this|deze)\b\s+\bweek\b";
const TODAY_PATTERN: &str = r"\bvandaag\b|\btoday\b";
const MENTION_PATTERN: &str = r"<@([A-Z0-9]+)(?:\|[^>]*)?>";

/// Keyword rule that fires independently of every other rule.
struct Rule {
    intent: Intent,
    pattern: Regex,
}

/// Compiled pattern table for one set of bot names.
pub struct IntentClassifier {
    bot_address: Regex,
    rules: Vec<Rule>,
    lunch: Regex,
    this_week: Regex,
    today: Regex,
    mention: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| AppError::Config(format!("invalid pattern {pattern}: {err}")))
}

impl IntentClassifier {
    /// Compile the pattern table for the given bot names.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `bot_names` is empty or a pattern fails
    /// to compile.
    pub fn new<S: AsRef<str>>(bot_names: &[S]) -> Result<Self> {
        let names: Vec<String> = bot_names
            .iter()
            .map(|name| name.as_ref().trim())
            .filter(|name| !name.is_empty())
            .map(regex::escape)
            .collect();
        if names.is_empty() {
            return Err(AppError::Config("at least one bot name is required".into()));
        }
        let alternatives = names.join("|");

        Ok(Self {
            bot_address: compile(&format!(
                r"^\b(?:{alternatives})\b|\b(?:{alternatives})\??$"
            ))?,
            rules: vec![
                Rule {
                    intent: Intent::Help,
                    pattern: compile(HELP_PATTERN)?,
                },
                Rule {
                    intent: Intent::GoAway,
                    pattern: compile(GO_AWAY_PATTERN)?,
                },
                Rule {
                    intent: Intent::OnCallStatus,
                    pattern: compile(ON_CALL_PATTERN)?,
                },
            ],
            lunch: compile(LUNCH_PATTERN)?,
            this_week: compile(THIS_WEEK_PATTERN)?,
            today: compile(TODAY_PATTERN)?,
            mention: compile(MENTION_PATTERN)?,
        })
    }

    /// Replace every `<@ID>` mention with the user's display name.
    ///
    /// Each distinct id is looked up once. A failed lookup is logged and the
    /// raw mention token stays in the text.
    pub async fn resolve_mentions(&self, text: &str, transport: &dyn ChatTransport) -> String {
        let mut ids: Vec<String> = Vec::new();
        for caps in self.mention.captures_iter(text) {
            let id = caps[1].to_owned();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return text.to_owned();
        }

        let mut names: HashMap<String, String> = HashMap::with_capacity(ids.len());
        for id in ids {
            match transport.resolve_user_name(&id).await {
                Ok(name) => {
                    names.insert(id, name);
                }
                Err(err) => {
                    warn!(user_id = id, %err, "failed to resolve mentioned user");
                }
            }
        }

        self.mention
            .replace_all(text, |caps: &Captures<'_>| {
                names
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_owned())
            })
            .into_owned()
    }

    /// Whether `text` starts or ends with one of the bot's names.
    #[must_use]
    pub fn is_addressed(&self, text: &str) -> bool {
        self.bot_address.is_match(text)
    }

    /// Classify a message whose mentions are already resolved.
    ///
    /// `direct_message` brings a message into scope even when the bot is not
    /// named.
    #[must_use]
    pub fn classify(&self, text: &str, direct_message: bool) -> Classification {
        if !direct_message && !self.is_addressed(text) {
            return Classification::no_match(text);
        }

        let trimmed_text = self.bot_address.replace_all(text, "").trim().to_owned();
        let mut intents: Vec<Intent> = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.is_match(&trimmed_text))
            .map(|rule| rule.intent)
            .collect();

        if let Some(lunch) = self.lunch_intent(&trimmed_text) {
            intents.push(lunch);
        }

        if intents.is_empty() {
            intents.push(Intent::NoMatch);
        }

        debug!(?intents, trimmed_text, "classified message");
        Classification {
            intents,
            trimmed_text,
        }
    }

    /// Pick the single lunch intent for `text`, if it mentions lunch at all.
    ///
    /// "This week" beats "today"; a lunch mention with neither keyword means
    /// today.
    fn lunch_intent(&self, text: &str) -> Option<Intent> {
        if !self.lunch.is_match(text) {
            return None;
        }
        if self.this_week.is_match(text) {
            return Some(Intent::LunchThisWeek);
        }
        if !self.today.is_match(text) {
            debug!("lunch mentioned without a day, defaulting to today");
        }
        Some(Intent::LunchToday)
    }
}
