//! Fixed text pools for chat replies and the random picker that draws from them.

use rand::seq::SliceRandom;

/// Greeting lines prepended to broadcast "not found" lunch messages.
pub const INTRO_MESSAGES: &[&str] = &[
    "Hi there! Are you as excited about lunch as I am? Let me see what's on the menu.",
    "Hola, it's almost time for lunch! Let's see what I can hustle up.",
];

/// First line of a "lunch not found" reply.
pub const NOT_FOUND_MESSAGES: &[&str] = &[
    "Hmmm. I'm not sure what's on the menu today, all I can say is:",
    "Don't see anything on the menu today, but my logs say:",
    "Hmmm. I Couldn't find any lunchings. Slogan time!",
    "No special lunch found, can someone insert my batteries? -BEEP-",
    "Where is that lunch? Maybe you should try turning me off and on again",
];

/// Closing quote of a "lunch not found" reply.
pub const NOT_FOUND_QUOTES: &[&str] = &[
    r#""404 Lunch not found" - Mollie monolith backend"#,
    r#""There will be bread." - a bread fanatic"#,
    r#""Elementary, my dear Watson. It looks like bread." - Mollie Holmes, probably."#,
    r#""Keep your friends close, but your bread closer." - Sun Tzu"#,
    r#""Bread. Shaken, not stirred." - James Bread"#,
    "We'll always have bread.",
    r#""They call it a royale with cheese. That means bread.""#,
    r#""Nothing on the menu, but I will have my lunch, in this life or the next." - Me. 100%"#,
    r#""This bread seems somewhat familiar; have I eaten this before?" - Captain Jack Sparrow"#,
    r#""I'll always have bread, bread with peanutbutter." - Tjeerd"#,
];

/// Decorative footers appended to every reply unless overridden in config.
pub const DEFAULT_FOOTERS: &[&str] = &[
    "ヾ(⌐■_■)ノ♪",
    "ヽ(°◇° )ノ",
    "\\(^~^)/",
    "•ᴗ•",
    "(⌐■_■)",
    "(☞ﾟヮﾟ)☞",
    "(•‿•) ",
    "(」ﾟﾛﾟ)｣ ",
];

/// Chooses one line out of a pool.
///
/// Production code picks uniformly at random; tests substitute a
/// deterministic picker and assert pool membership.
pub trait Picker: Send + Sync {
    /// Return one element of `pool`, or `""` when the pool is empty.
    fn pick<'a>(&self, pool: &[&'a str]) -> &'a str;
}

/// Uniform random choice using the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl Picker for RandomPicker {
    fn pick<'a>(&self, pool: &[&'a str]) -> &'a str {
        pool.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
    }
}

/// Compose the "lunch not found" text, optionally led by a greeting.
#[must_use]
pub fn lunch_not_found(picker: &dyn Picker, introduction: bool) -> String {
    let mut message = String::new();
    if introduction {
        message.push_str(picker.pick(INTRO_MESSAGES));
        message.push('\n');
    }
    message.push_str(picker.pick(NOT_FOUND_MESSAGES));
    message.push_str("\n\n");
    message.push_str(picker.pick(NOT_FOUND_QUOTES));
    message
}
