//! Core data models used throughout Article Harness.
//!
//! These types represent the documents, parsed metadata, and articles that
//! flow through the ingestion and enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Maximum number of tags an article may carry.
pub const MAX_TAGS: usize = 8;

/// Trim tags, drop empty entries, collapse case-insensitive duplicates
/// (first spelling wins) and cap the list at [`MAX_TAGS`].
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() || !seen.insert(tag.to_lowercase()) {
            continue;
        }
        out.push(tag.to_string());
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

/// Raw document read from the content root. Discarded after parsing.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the content root, e.g. `guides/getting_started.md`.
    pub source_id: String,
    pub content: String,
}

/// Front-matter fields with their declared types.
///
/// `None` means "not specified"; `Some(vec![])` for tags means the author
/// explicitly declared an empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub author_contact: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub read_time: Option<u32>,
    /// Unrecognized `key: value` pairs, kept verbatim.
    pub extra: BTreeMap<String, String>,
}

/// Everything the synthesizer derives for one document.
///
/// All required fields are populated; only the read time may still be
/// pending enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleAttributes {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub author: Option<String>,
    pub author_contact: Option<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published: bool,
    pub published_at: DateTime<Utc>,
    pub estimated_read_minutes: Option<u32>,
    pub source_path: String,
    pub content_hash: String,
}

impl ArticleAttributes {
    /// Finalize into the field set written by upsert. The read time must
    /// have been resolved by enrichment.
    pub fn into_fields(self, estimated_read_minutes: u32) -> (String, ArticleFields) {
        (
            self.slug,
            ArticleFields {
                title: self.title,
                body: self.body,
                excerpt: self.excerpt,
                author: self.author,
                author_contact: self.author_contact,
                tags: self.tags,
                featured: self.featured,
                published: self.published,
                published_at: self.published_at,
                estimated_read_minutes: estimated_read_minutes.max(1),
                source_path: self.source_path,
                content_hash: self.content_hash,
            },
        )
    }
}

/// Mutable, content-derived fields of an article.
///
/// Identity fields (`id`, `slug`, `created_at`) and the presentation-owned
/// `view_count` live on [`Article`] only, so an update cannot touch them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleFields {
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub author: Option<String>,
    pub author_contact: Option<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published: bool,
    pub published_at: DateTime<Utc>,
    pub estimated_read_minutes: u32,
    pub source_path: String,
    pub content_hash: String,
}

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: String,
    pub slug: String,
    #[serde(flatten)]
    pub fields: ArticleFields,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags_dedupes_and_caps() {
        let tags = normalize_tags(["a", "b", "a", " ", "B", "c"]);
        assert_eq!(tags, vec!["a", "b", "c"]);

        let many: Vec<String> = (0..20).map(|i| format!("t{}", i)).collect();
        assert_eq!(normalize_tags(&many).len(), MAX_TAGS);
    }
}
