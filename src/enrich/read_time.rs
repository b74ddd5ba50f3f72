//! Reading-time estimation: remote prompt, response validation, and the
//! word-count fallback.

use crate::text::{strip_markdown, truncate_chars, word_count};

/// Average adult reading speed used by the fallback.
pub const WORDS_PER_MINUTE: f64 = 225.0;
/// Only this many leading characters of the body are sent to the model.
pub const REMOTE_INPUT_CHARS: usize = 4000;
/// Accepted range for a model-supplied estimate.
pub const REMOTE_MINUTES_RANGE: std::ops::RangeInclusive<u32> = 1..=60;

pub fn prompt(body: &str) -> String {
    format!(
        "Estimate how many minutes an average reader needs to read the following article. \
         Skip over code blocks quickly. Reply with a single integer and nothing else.\n\n\
         ---\n{}\n---",
        truncate_chars(body, REMOTE_INPUT_CHARS)
    )
}

/// Keep only the digits of a model reply and accept the result when it falls
/// inside [`REMOTE_MINUTES_RANGE`].
pub fn parse_minutes(response: &str) -> Option<u32> {
    let digits: String = response.chars().filter(char::is_ascii_digit).collect();
    let minutes = digits.parse::<u32>().ok()?;
    REMOTE_MINUTES_RANGE.contains(&minutes).then_some(minutes)
}

/// Word-count estimate: code and markup stripped, `round(words / 225)`,
/// never less than one minute. Pure function of `text`.
pub fn read_time_fallback(text: &str) -> u32 {
    let words = word_count(&strip_markdown(text));
    let minutes = (words as f64 / WORDS_PER_MINUTE).round() as u32;
    minutes.max(1)
}
