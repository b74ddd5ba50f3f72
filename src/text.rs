//! Markdown-to-plain-text helpers shared by the synthesizer and the
//! enrichment fallbacks.
//!
//! Everything here is pure and deterministic.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```|~~~.*?~~~").expect("valid regex"));
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s*").expect("valid regex"));
static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*>\s?").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
static STRONG_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static STRONG_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_]+)__").expect("valid regex"));
static EM_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*)\*").expect("valid regex"));
static EM_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^_]+)_\b").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid regex"));

/// Remove fenced code blocks (``` or ~~~).
pub fn strip_code_blocks(text: &str) -> String {
    FENCED_CODE.replace_all(text, " ").into_owned()
}

/// Reduce markdown to its readable text: code blocks dropped, links and
/// images replaced by their text, heading/quote markers, emphasis, inline
/// code and HTML tags removed. Whitespace is left as-is.
pub fn strip_markdown(text: &str) -> String {
    let text = strip_code_blocks(text);
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = STRONG_STAR.replace_all(&text, "$1");
    let text = STRONG_UNDERSCORE.replace_all(&text, "$1");
    let text = EM_STAR.replace_all(&text, "$1");
    let text = EM_UNDERSCORE.replace_all(&text, "$1");
    HTML_TAG.replace_all(&text, "").into_owned()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Cut `text` at the last whole word fitting in `max_chars` characters and
/// append `...`. Text already within the limit is returned unchanged.
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = truncate_chars(text, max_chars);
    let next_is_break = text[cut.len()..]
        .chars()
        .next()
        .map_or(true, char::is_whitespace);

    let head = if next_is_break {
        cut
    } else {
        match cut.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &cut[..pos],
            _ => cut,
        }
    };

    let head = head.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':'));
    format!("{}...", head)
}

/// Lowercase alphanumeric word tokens, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Hex SHA-256 of the raw document, used to report whether content changed.
pub fn content_hash(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markdown_keeps_link_text() {
        let md = "# Title\n\nSee [the guide](https://example.com) and ![a diagram](d.png).";
        let plain = collapse_whitespace(&strip_markdown(md));
        assert_eq!(plain, "Title See the guide and a diagram.");
    }

    #[test]
    fn test_strip_markdown_removes_code_and_emphasis() {
        let md = "Use **bold**, *italic*, __strong__ and `inline`.\n\n```rust\nfn main() {}\n```\n> quoted";
        let plain = collapse_whitespace(&strip_markdown(md));
        assert_eq!(plain, "Use bold, italic, strong and inline. quoted");
    }

    #[test]
    fn test_snake_case_survives() {
        let plain = strip_markdown("call load_on_startup now");
        assert_eq!(plain, "call load_on_startup now");
    }

    #[test]
    fn test_truncate_words_whole_words() {
        let text = "alpha beta gamma delta";
        assert_eq!(truncate_words(text, 13), "alpha beta...");
        assert_eq!(truncate_words(text, 16), "alpha beta gamma...");
        assert_eq!(truncate_words(text, 100), text);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Getting-Started with Rust's cargo!"),
            vec!["getting", "started", "with", "rust", "s", "cargo"]
        );
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
