//! Article statistics for `articles stats`.
//!
//! Summarizes what the pipeline has stored: counts, featured and published
//! split, tag coverage, average read time and the most common tags.

use anyhow::Result;
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::models::Article;
use crate::store::sqlite::SqliteStore;
use crate::store::ArticleStore;

const TOP_TAGS: usize = 10;

#[derive(Debug, Default, PartialEq)]
pub struct ArticleStats {
    pub total: usize,
    pub featured: usize,
    pub published: usize,
    pub tagged: usize,
    pub average_read_minutes: f64,
    /// Most frequent tags, highest count first, ties by name.
    pub top_tags: Vec<(String, usize)>,
}

pub fn compute_stats(articles: &[Article]) -> ArticleStats {
    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    for article in articles {
        for tag in &article.fields.tags {
            *tag_counts.entry(tag.as_str()).or_default() += 1;
        }
    }
    let mut top_tags: Vec<(String, usize)> = tag_counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_tags.truncate(TOP_TAGS);

    let total_minutes: u64 = articles
        .iter()
        .map(|a| a.fields.estimated_read_minutes as u64)
        .sum();

    ArticleStats {
        total: articles.len(),
        featured: articles.iter().filter(|a| a.fields.featured).count(),
        published: articles.iter().filter(|a| a.fields.published).count(),
        tagged: articles.iter().filter(|a| !a.fields.tags.is_empty()).count(),
        average_read_minutes: if articles.is_empty() {
            0.0
        } else {
            total_minutes as f64 / articles.len() as f64
        },
        top_tags,
    }
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let articles = SqliteStore::new(pool.clone()).list().await?;
    pool.close().await;

    let stats = compute_stats(&articles);
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Article Harness — Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Articles:    {}", stats.total);
    println!("  Published:   {}", stats.published);
    println!("  Featured:    {}", stats.featured);
    println!(
        "  Tagged:      {} / {} ({}%)",
        stats.tagged,
        stats.total,
        if stats.total > 0 {
            (stats.tagged * 100) / stats.total
        } else {
            0
        }
    );
    println!("  Avg read:    {:.1} min", stats.average_read_minutes);

    if !stats.top_tags.is_empty() {
        println!();
        println!("  Top tags:");
        println!("  {:<24} {:>6}", "TAG", "COUNT");
        println!("  {}", "-".repeat(31));
        for (tag, count) in &stats.top_tags {
            println!("  {:<24} {:>6}", tag, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_article;

    #[test]
    fn test_compute_stats() {
        let mut a = sample_article("a");
        a.fields.tags = vec!["rust".to_string(), "cli".to_string()];
        a.fields.featured = true;
        a.fields.estimated_read_minutes = 4;
        let mut b = sample_article("b");
        b.fields.tags = vec!["rust".to_string()];
        b.fields.estimated_read_minutes = 2;
        let mut c = sample_article("c");
        c.fields.tags.clear();
        c.fields.published = false;
        c.fields.estimated_read_minutes = 3;

        let stats = compute_stats(&[a, b, c]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.featured, 1);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.tagged, 2);
        assert!((stats.average_read_minutes - 3.0).abs() < f64::EPSILON);
        assert_eq!(
            stats.top_tags,
            vec![("rust".to_string(), 2), ("cli".to_string(), 1)]
        );
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(compute_stats(&[]), ArticleStats::default());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
