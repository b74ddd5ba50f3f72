//! Article retrieval by slug for `articles get`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::models::Article;
use crate::store::sqlite::SqliteStore;
use crate::store::ArticleStore;

pub async fn get_article(config: &Config, slug: &str) -> Result<Article> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let article = store.find_by_slug(slug).await;
    pool.close().await;

    match article? {
        Some(article) => Ok(article),
        None => bail!("article not found: {}", slug),
    }
}

/// CLI entry point: print the record to stdout.
pub async fn run_get(config: &Config, slug: &str) -> Result<()> {
    let article = match get_article(config, slug).await {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let f = &article.fields;

    println!("--- Article ---");
    println!("id:           {}", article.id);
    println!("slug:         {}", article.slug);
    println!("title:        {}", f.title);
    if let Some(ref author) = f.author {
        println!("author:       {}", author);
    }
    if let Some(ref contact) = f.author_contact {
        println!("contact:      {}", contact);
    }
    println!("source:       {}", f.source_path);
    println!("tags:         {}", f.tags.join(", "));
    println!("featured:     {}", f.featured);
    println!("published:    {}", f.published);
    println!("published_at: {}", format_ts(f.published_at));
    println!("read_time:    {} min", f.estimated_read_minutes);
    println!("views:        {}", article.view_count);
    println!("created_at:   {}", format_ts(article.created_at));
    println!("updated_at:   {}", format_ts(article.updated_at));
    println!();

    println!("--- Excerpt ---");
    println!("{}", f.excerpt);
    println!();

    println!("--- Body ---");
    println!("{}", f.body);

    Ok(())
}

fn format_ts(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
