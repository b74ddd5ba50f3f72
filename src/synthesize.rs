//! Attribute synthesis.
//!
//! Turns parsed front-matter plus body into a complete
//! [`ArticleAttributes`]: slug from the file name, an excerpt from the
//! body, a best-effort "featured" classification, and defaults for every
//! field the author left out.

use chrono::Utc;
use std::path::Path;

use crate::frontmatter::UNTITLED;
use crate::models::{normalize_tags, ArticleAttributes, ParsedMetadata, SourceDocument};
use crate::text::{collapse_whitespace, content_hash, strip_markdown, truncate_words};

/// Excerpts at or under this length are used whole.
pub const EXCERPT_TARGET_CHARS: usize = 150;
/// Hard ceiling for any stored excerpt, declared or generated.
pub const EXCERPT_MAX_CHARS: usize = 200;
/// A leading sentence must be longer than this to stand alone as the excerpt.
const SENTENCE_MIN_CHARS: usize = 50;
/// Word-boundary cut used when no suitable sentence exists.
const WORD_CUT_CHARS: usize = 140;

/// Build the full attribute set for one document.
pub fn synthesize(
    meta: ParsedMetadata,
    body: String,
    doc: &SourceDocument,
    featured_keywords: &[String],
) -> ArticleAttributes {
    let slug = meta
        .slug
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slug_from_source(&doc.source_id));

    let title = meta
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let excerpt = match meta.excerpt {
        Some(declared) => clamp_excerpt(&declared),
        None => make_excerpt(&body),
    };
    let excerpt = if excerpt.is_empty() {
        clamp_excerpt(&title)
    } else {
        excerpt
    };

    let featured = meta
        .featured
        .unwrap_or_else(|| is_featured(&slug, &title, featured_keywords));

    ArticleAttributes {
        tags: meta.tags.map(normalize_tags).unwrap_or_default(),
        published: meta.published.unwrap_or(true),
        published_at: meta.published_at.unwrap_or_else(Utc::now),
        estimated_read_minutes: meta.read_time.filter(|m| *m >= 1),
        author: meta.author,
        author_contact: meta.author_contact,
        source_path: doc.source_id.clone(),
        content_hash: content_hash(&doc.content),
        slug,
        title,
        body,
        excerpt,
        featured,
    }
}

/// `guides/getting_started.md` → `getting-started`.
pub fn slug_from_source(source_id: &str) -> String {
    let stem = Path::new(source_id)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_id.to_string());
    stem.replace('_', "-")
}

/// Generate a plain-text excerpt from a markdown body.
///
/// Short text is kept whole. Otherwise a leading sentence longer than
/// [`SENTENCE_MIN_CHARS`] is preferred; failing that the text is cut at a
/// word boundary and an ellipsis appended.
pub fn make_excerpt(body: &str) -> String {
    let plain = collapse_whitespace(&strip_markdown(body));
    if plain.chars().count() <= EXCERPT_TARGET_CHARS {
        return plain;
    }

    if let Some((first, _)) = plain.split_once(". ") {
        let len = first.chars().count();
        if len > SENTENCE_MIN_CHARS && len < EXCERPT_TARGET_CHARS {
            return format!("{}.", first);
        }
    }

    truncate_words(&plain, WORD_CUT_CHARS)
}

fn clamp_excerpt(text: &str) -> String {
    let text = collapse_whitespace(text);
    if text.chars().count() <= EXCERPT_MAX_CHARS {
        text
    } else {
        truncate_words(&text, EXCERPT_MAX_CHARS - 3)
    }
}

/// Best-effort classification: true when the slug or title contains any of
/// the keywords, case-insensitively.
pub fn is_featured(slug: &str, title: &str, keywords: &[String]) -> bool {
    let slug = slug.to_lowercase();
    let title = title.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| slug.contains(&k) || title.contains(&k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source_id: &str) -> SourceDocument {
        SourceDocument {
            source_id: source_id.to_string(),
            content: "raw".to_string(),
        }
    }

    fn keywords() -> Vec<String> {
        vec!["getting-started".to_string(), "onboarding".to_string()]
    }

    #[test]
    fn test_slug_from_source() {
        assert_eq!(slug_from_source("getting_started.md"), "getting-started");
        assert_eq!(slug_from_source("guides/deep_dive_v2.markdown"), "deep-dive-v2");
        assert_eq!(slug_from_source("notes"), "notes");
    }

    #[test]
    fn test_declared_slug_wins() {
        let meta = ParsedMetadata {
            title: Some("T".to_string()),
            slug: Some("custom".to_string()),
            ..Default::default()
        };
        let attrs = synthesize(meta, "body".to_string(), &doc("file_name.md"), &[]);
        assert_eq!(attrs.slug, "custom");
    }

    #[test]
    fn test_defaults() {
        let meta = ParsedMetadata {
            title: Some("Plain".to_string()),
            ..Default::default()
        };
        let attrs = synthesize(meta, "Short body.".to_string(), &doc("plain.md"), &keywords());
        assert_eq!(attrs.slug, "plain");
        assert_eq!(attrs.excerpt, "Short body.");
        assert!(attrs.published);
        assert!(!attrs.featured);
        assert!(attrs.tags.is_empty());
        assert_eq!(attrs.author, None);
        assert_eq!(attrs.estimated_read_minutes, None);
        assert_eq!(attrs.source_path, "plain.md");
        assert_eq!(attrs.content_hash.len(), 64);
    }

    #[test]
    fn test_tags_deduplicated() {
        let meta = ParsedMetadata {
            title: Some("T".to_string()),
            tags: Some(vec!["a".to_string(), "b".to_string(), "a".to_string()]),
            ..Default::default()
        };
        let attrs = synthesize(meta, "b".to_string(), &doc("t.md"), &[]);
        assert_eq!(attrs.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_zero_read_time_left_pending() {
        let meta = ParsedMetadata {
            title: Some("T".to_string()),
            read_time: Some(0),
            ..Default::default()
        };
        let attrs = synthesize(meta, "b".to_string(), &doc("t.md"), &[]);
        assert_eq!(attrs.estimated_read_minutes, None);
    }

    #[test]
    fn test_featured_heuristic() {
        assert!(is_featured("getting-started", "Anything", &keywords()));
        assert!(is_featured("x", "Team ONBOARDING notes", &keywords()));
        assert!(!is_featured("x", "Deep dive", &keywords()));
        assert!(!is_featured("x", "y", &["  ".to_string()]));
    }

    #[test]
    fn test_explicit_featured_wins() {
        let meta = ParsedMetadata {
            title: Some("Onboarding".to_string()),
            featured: Some(false),
            ..Default::default()
        };
        let attrs = synthesize(meta, "b".to_string(), &doc("onboarding.md"), &keywords());
        assert!(!attrs.featured);
    }

    #[test]
    fn test_excerpt_prefers_long_first_sentence() {
        let first = "This opening sentence is comfortably longer than fifty characters in total";
        let body = format!("{}. {}", first, "Filler words keep going. ".repeat(10));
        let excerpt = make_excerpt(&body);
        assert_eq!(excerpt, format!("{}.", first));
    }

    #[test]
    fn test_excerpt_word_truncation() {
        let body = "Short one. ".to_string() + &"lorem ipsum dolor ".repeat(20);
        let excerpt = make_excerpt(&body);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= 143);
        assert!(!excerpt.contains("  "));
    }

    #[test]
    fn test_excerpt_strips_markup() {
        let body = "## Intro\n\n```\ncode\n```\nRead the [docs](http://x) **now**.";
        assert_eq!(make_excerpt(body), "Intro Read the docs now.");
    }

    #[test]
    fn test_excerpt_never_empty() {
        let meta = ParsedMetadata {
            title: Some("Only a title".to_string()),
            ..Default::default()
        };
        let attrs = synthesize(meta, "```\ncode only\n```".to_string(), &doc("c.md"), &[]);
        assert_eq!(attrs.excerpt, "Only a title");
    }

    #[test]
    fn test_declared_excerpt_clamped() {
        let meta = ParsedMetadata {
            title: Some("T".to_string()),
            excerpt: Some("word ".repeat(100)),
            ..Default::default()
        };
        let attrs = synthesize(meta, "b".to_string(), &doc("t.md"), &[]);
        assert!(attrs.excerpt.chars().count() <= EXCERPT_MAX_CHARS);
        assert!(attrs.excerpt.ends_with("..."));
    }

    #[test]
    fn test_excerpt_bound_over_many_bodies() {
        for n in [0usize, 1, 10, 49, 51, 150, 151, 400] {
            let body = "x".repeat(n) + " tail words here. And more text follows after.";
            let meta = ParsedMetadata {
                title: Some("T".to_string()),
                ..Default::default()
            };
            let attrs = synthesize(meta, body, &doc("t.md"), &[]);
            let len = attrs.excerpt.chars().count();
            assert!(len > 0 && len <= EXCERPT_MAX_CHARS, "n={} len={}", n, len);
        }
    }
}
