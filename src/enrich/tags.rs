//! Topical tag generation: remote prompt and response validation, plus the
//! keyword-taxonomy fallback.

use std::collections::{BTreeMap, HashSet};

use crate::models::{normalize_tags, MAX_TAGS};
use crate::text::{tokenize, truncate_chars};

/// Only this many leading characters of the body are sent to the model.
pub const REMOTE_INPUT_CHARS: usize = 3000;
/// Single-word tokens shorter than this never match a taxonomy key.
pub const MIN_TOKEN_CHARS: usize = 3;
/// Remote tags longer than this are discarded.
const MAX_TAG_CHARS: usize = 40;

/// Static keyword → tags table plus the featured-keyword list.
///
/// Keys are normalized to lowercase space-separated tokens, so
/// `"Getting-Started"` and `"getting started"` are the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    keywords: BTreeMap<String, Vec<String>>,
    featured_keywords: Vec<String>,
}

impl Taxonomy {
    pub fn new(keywords: BTreeMap<String, Vec<String>>, featured_keywords: Vec<String>) -> Self {
        let mut normalized: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, tags) in keywords {
            let key = tokenize(&key).join(" ");
            if key.is_empty() {
                continue;
            }
            normalized.entry(key).or_default().extend(tags);
        }
        Self {
            keywords: normalized,
            featured_keywords,
        }
    }

    pub fn keywords(&self) -> &BTreeMap<String, Vec<String>> {
        &self.keywords
    }

    pub fn featured_keywords(&self) -> &[String] {
        &self.featured_keywords
    }
}

const SEED_KEYWORDS: &[(&str, &[&str])] = &[
    ("api", &["api", "backend"]),
    ("artificial intelligence", &["ai"]),
    ("async", &["async", "concurrency"]),
    ("aws", &["aws", "cloud"]),
    ("cargo", &["rust", "tooling"]),
    ("cloud", &["cloud"]),
    ("concurrency", &["concurrency"]),
    ("continuous integration", &["ci-cd", "devops"]),
    ("database", &["databases"]),
    ("deployment", &["deployment", "devops"]),
    ("docker", &["docker", "containers", "devops"]),
    ("documentation", &["documentation"]),
    ("getting started", &["getting-started", "beginner"]),
    ("git", &["git", "tooling"]),
    ("javascript", &["javascript", "web"]),
    ("kubernetes", &["kubernetes", "containers", "devops"]),
    ("linux", &["linux"]),
    ("llm", &["ai", "llm"]),
    ("machine learning", &["machine-learning", "ai"]),
    ("markdown", &["markdown", "writing"]),
    ("onboarding", &["onboarding", "getting-started"]),
    ("performance", &["performance"]),
    ("postgres", &["postgres", "databases"]),
    ("python", &["python", "programming"]),
    ("react", &["react", "frontend", "web"]),
    ("rust", &["rust", "programming"]),
    ("security", &["security"]),
    ("sql", &["sql", "databases"]),
    ("sqlite", &["sqlite", "databases"]),
    ("testing", &["testing"]),
    ("tutorial", &["tutorial"]),
    ("typescript", &["typescript", "javascript", "web"]),
];

const SEED_FEATURED: &[&str] = &[
    "getting-started",
    "getting started",
    "onboarding",
    "introduction",
    "quickstart",
    "quick-start",
    "welcome",
    "first-steps",
    "start-here",
];

impl Default for Taxonomy {
    fn default() -> Self {
        let keywords = SEED_KEYWORDS
            .iter()
            .map(|(key, tags)| {
                (
                    key.to_string(),
                    tags.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        let featured = SEED_FEATURED.iter().map(|k| k.to_string()).collect();
        Self::new(keywords, featured)
    }
}

/// Deterministic local tagging.
///
/// The text is lowercased and tokenized; single-word keys match any token of
/// at least [`MIN_TOKEN_CHARS`] characters, multi-word keys match as a whole
/// phrase. Matched keys contribute their tags in key order; the result is
/// deduplicated and capped at [`MAX_TAGS`].
pub fn tags_fallback(text: &str, taxonomy: &Taxonomy) -> Vec<String> {
    let tokens = tokenize(text);
    let words: HashSet<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .collect();
    let phrase_text = format!(" {} ", tokens.join(" "));

    let mut tags = Vec::new();
    for (keyword, mapped) in taxonomy.keywords() {
        let matched = if keyword.contains(' ') {
            phrase_text.contains(&format!(" {} ", keyword))
        } else {
            words.contains(keyword.as_str())
        };
        if matched {
            tags.extend(mapped.iter().cloned());
        }
    }

    normalize_tags(tags)
}

pub fn prompt(title: &str, excerpt: &str, body: &str, subject_areas: &[String]) -> String {
    format!(
        "Suggest up to {max} short topical tags for the article below. \
         Only use tags within these subject areas: {areas}. \
         Respond with a JSON array of lowercase strings and nothing else.\n\n\
         Title: {title}\nSummary: {excerpt}\n\n---\n{body}\n---",
        max = MAX_TAGS,
        areas = subject_areas.join(", "),
        title = title,
        excerpt = excerpt,
        body = truncate_chars(body, REMOTE_INPUT_CHARS),
    )
}

/// Validate a model reply as a JSON array of non-empty strings.
///
/// Surrounding prose or a code fence around the array is tolerated. Blank
/// and overlong entries are dropped; a reply with no usable tag is invalid.
pub fn parse_tag_response(response: &str) -> Result<Vec<String>, String> {
    let start = response.find('[').ok_or("no JSON array in response")?;
    let end = response.rfind(']').ok_or("no JSON array in response")?;
    if end < start {
        return Err("no JSON array in response".to_string());
    }

    let value: serde_json::Value =
        serde_json::from_str(&response[start..=end]).map_err(|e| e.to_string())?;
    let items = value.as_array().ok_or("response is not a JSON array")?;

    let mut tags = Vec::with_capacity(items.len());
    for item in items {
        let tag = item.as_str().ok_or("array contains a non-string entry")?;
        let tag = tag.trim();
        if !tag.is_empty() && tag.chars().count() <= MAX_TAG_CHARS {
            tags.push(tag.to_string());
        }
    }

    let tags = normalize_tags(tags);
    if tags.is_empty() {
        return Err("response contained no usable tags".to_string());
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_taxonomy() -> Taxonomy {
        let mut keywords = BTreeMap::new();
        keywords.insert("rust".to_string(), vec!["rust".to_string(), "programming".to_string()]);
        keywords.insert("Machine-Learning".to_string(), vec!["ml".to_string()]);
        keywords.insert("go".to_string(), vec!["golang".to_string()]);
        Taxonomy::new(keywords, Vec::new())
    }

    #[test]
    fn test_keys_normalized() {
        let taxonomy = small_taxonomy();
        assert!(taxonomy.keywords().contains_key("machine learning"));
    }

    #[test]
    fn test_fallback_matches_words_and_phrases() {
        let tags = tags_fallback("Rust meets machine learning", &small_taxonomy());
        assert_eq!(tags, vec!["ml", "rust", "programming"]);
    }

    #[test]
    fn test_fallback_ignores_short_tokens_and_substrings() {
        let tags = tags_fallback("go trusty rusty machines", &small_taxonomy());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_fallback_caps_and_dedupes() {
        let text = "rust cargo docker kubernetes python react sql sqlite security testing";
        let tags = tags_fallback(text, &Taxonomy::default());
        assert_eq!(tags.len(), MAX_TAGS);
        let unique: HashSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn test_fallback_deterministic() {
        let text = "A Docker and Kubernetes deployment tutorial";
        let a = tags_fallback(text, &Taxonomy::default());
        let b = tags_fallback(text, &Taxonomy::default());
        assert_eq!(a, b);
        assert!(a.contains(&"docker".to_string()));
    }

    #[test]
    fn test_parse_tag_response_plain_and_fenced() {
        assert_eq!(
            parse_tag_response(r#"["rust", "cli"]"#).unwrap(),
            vec!["rust", "cli"]
        );
        let fenced = "Sure!\n```json\n[\"a\", \"b\", \"a\"]\n```";
        assert_eq!(parse_tag_response(fenced).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_tag_response_rejects() {
        assert!(parse_tag_response("rust, cli").is_err());
        assert!(parse_tag_response("[]").is_err());
        assert!(parse_tag_response(r#"["", "  "]"#).is_err());
        assert!(parse_tag_response(r#"[1, 2]"#).is_err());
        assert!(parse_tag_response("] backwards [").is_err());
    }

    #[test]
    fn test_parse_tag_response_caps() {
        let many: Vec<String> = (0..12).map(|i| format!("\"t{}\"", i)).collect();
        let reply = format!("[{}]", many.join(","));
        assert_eq!(parse_tag_response(&reply).unwrap().len(), MAX_TAGS);
    }
}
