//! Front-matter parsing.
//!
//! Splits a raw article into a [`ParsedMetadata`] block and a body.
//!
//! # Accepted shapes
//!
//! ```text
//! ---                          # Heading Title
//! title: "Hello"               Body text...
//! tags: [rust, "async"]
//! date: 2024-03-01
//! ---
//! Body text...
//! ```
//!
//! A fenced block must open on the first line and close on a later line
//! consisting only of `---`. Without one, the first `# ` heading becomes
//! the title and is removed from the body. Parsing never fails on missing
//! structure; the only hard error is a non-numeric value for an integer
//! field.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::models::ParsedMetadata;

/// Front-matter fence marker.
pub const DELIMITER: &str = "---";

/// Title used when a document declares none and has no heading.
pub const UNTITLED: &str = "Untitled";

const LIST_KEYS: &[&str] = &["tags", "keywords", "categories"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("front-matter field '{key}' must be an integer, got '{value}'")]
    InvalidInteger { key: String, value: String },
}

/// Parse a raw document into its metadata and body.
pub fn parse_document(raw: &str) -> Result<(ParsedMetadata, String), ParseError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    match split_front_matter(text) {
        Some((block, body)) => {
            let mut meta = parse_metadata_block(block)?;
            let body = if meta.title.is_some() {
                body.trim().to_string()
            } else {
                let (title, body) = extract_heading(body);
                meta.title = Some(title);
                body
            };
            Ok((meta, body))
        }
        None => {
            let (title, body) = extract_heading(text);
            let meta = ParsedMetadata {
                title: Some(title),
                ..Default::default()
            };
            Ok((meta, body))
        }
    }
}

/// Split `text` into `(metadata block, body)` when it opens with a fenced
/// front-matter block. Later `---` lines in the body are left alone.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let mut offset = first.len();
    for line in lines {
        if line.trim_end() == DELIMITER {
            let block = &text[first.len()..offset];
            let body = &text[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }
    None
}

fn parse_metadata_block(block: &str) -> Result<ParsedMetadata, ParseError> {
    let mut meta = ParsedMetadata::default();
    // Key of a list declared with an empty value, collecting `- item` lines.
    let mut open_list: Option<String> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            if open_list.is_some() {
                let item = strip_quotes(item.trim()).trim();
                if !item.is_empty() {
                    meta.tags.get_or_insert_with(Vec::new).push(item.to_string());
                }
                continue;
            }
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            tracing::debug!(line = trimmed, "skipping front-matter line without a key");
            continue;
        };

        let key = key.trim().to_ascii_lowercase();
        let is_list = LIST_KEYS.contains(&key.as_str());
        // List items carry their own quotes; `parse_list` strips them per item.
        let value = if is_list {
            value.trim()
        } else {
            strip_quotes(value.trim())
        };

        open_list = if value.is_empty() && is_list {
            meta.tags.get_or_insert_with(Vec::new);
            Some(key)
        } else {
            apply_field(&mut meta, &key, value)?;
            None
        };
    }

    Ok(meta)
}

fn apply_field(meta: &mut ParsedMetadata, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "title" => meta.title = non_empty(value),
        "slug" => meta.slug = non_empty(value),
        "excerpt" | "description" | "summary" => meta.excerpt = non_empty(value),
        "author" => meta.author = non_empty(value),
        "author_contact" | "author_email" | "email" => meta.author_contact = non_empty(value),
        "tags" | "keywords" | "categories" => {
            meta.tags
                .get_or_insert_with(Vec::new)
                .extend(parse_list(value));
        }
        "featured" => meta.featured = parse_bool(key, value),
        "published" => meta.published = parse_bool(key, value),
        "draft" => meta.published = parse_bool(key, value).map(|draft| !draft),
        "date" | "published_at" | "pubdate" => {
            // An unparseable date counts as undeclared; synthesis defaults it to now.
            meta.published_at = parse_timestamp(value);
            if meta.published_at.is_none() {
                tracing::warn!(key, value, "unparseable date in front-matter, using current time");
            }
        }
        "read_time" | "reading_time" | "estimated_read_minutes" => {
            meta.read_time = Some(parse_integer(key, value)?);
        }
        _ => {
            meta.extra.insert(key.to_string(), value.to_string());
        }
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Remove one pair of matching surrounding quotes.
fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// `[a, "b"]`, `"a", "b"` or `a, b` → `["a", "b"]`. A whole list wrapped in
/// one pair of quotes (`"a, b"`) is unwrapped first. Empty items are dropped.
pub fn parse_list(value: &str) -> Vec<String> {
    let value = strip_enclosing_quotes(value.trim());
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);

    inner
        .split(',')
        .map(|item| strip_quotes(item.trim()).trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Like [`strip_quotes`], but only when the quote character does not also
/// occur inside, so `"a", "b"` is left intact.
fn strip_enclosing_quotes(value: &str) -> &str {
    let inner = strip_quotes(value);
    if inner.len() == value.len() {
        return value;
    }
    let quote = &value[..1];
    if inner.contains(quote) {
        value
    } else {
        inner
    }
}

fn parse_bool(key: &str, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => {
            tracing::debug!(key, value, "ignoring non-boolean front-matter value");
            None
        }
    }
}

fn parse_integer(key: &str, value: &str) -> Result<u32, ParseError> {
    value.trim().parse::<u32>().map_err(|_| ParseError::InvalidInteger {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse an ISO-8601 date or date-time. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Take the first level-1 heading outside code fences as the title and drop
/// it from the body. Returns [`UNTITLED`] and the whole text when there is
/// no heading.
fn extract_heading(text: &str) -> (String, String) {
    let mut title = None;
    let mut in_fence = false;
    let mut body_lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        if title.is_none() && !in_fence {
            if let Some(rest) = line.strip_prefix("# ") {
                let heading = rest.trim().trim_end_matches('#').trim_end();
                if !heading.is_empty() {
                    title = Some(heading.to_string());
                    continue;
                }
            }
        }
        body_lines.push(line);
    }

    (
        title.unwrap_or_else(|| UNTITLED.to_string()),
        body_lines.join("\n").trim().to_string(),
    )
}
