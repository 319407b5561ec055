//! Unit tests for the reply text pools.

use molliebot::flavor::{
    lunch_not_found, Picker, RandomPicker, DEFAULT_FOOTERS, INTRO_MESSAGES, NOT_FOUND_MESSAGES,
    NOT_FOUND_QUOTES,
};

struct LastPicker;

impl Picker for LastPicker {
    fn pick<'a>(&self, pool: &[&'a str]) -> &'a str {
        pool.last().copied().unwrap_or_default()
    }
}

#[test]
fn random_picker_stays_in_the_pool() {
    for _ in 0..100 {
        let footer = RandomPicker.pick(DEFAULT_FOOTERS);
        assert!(DEFAULT_FOOTERS.contains(&footer));
    }
}

#[test]
fn random_picker_on_empty_pool_is_empty() {
    assert_eq!(RandomPicker.pick(&[]), "");
}

#[test]
fn not_found_layout() {
    let text = lunch_not_found(&LastPicker, false);
    assert_eq!(
        text,
        format!(
            "{}\n\n{}",
            NOT_FOUND_MESSAGES[NOT_FOUND_MESSAGES.len() - 1],
            NOT_FOUND_QUOTES[NOT_FOUND_QUOTES.len() - 1]
        )
    );
}

#[test]
fn introduction_goes_on_its_own_line() {
    let text = lunch_not_found(&LastPicker, true);
    let (intro, rest) = text.split_once('\n').expect("intro line");
    assert_eq!(intro, INTRO_MESSAGES[INTRO_MESSAGES.len() - 1]);
    assert_eq!(rest, lunch_not_found(&LastPicker, false));
}
