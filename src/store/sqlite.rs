//! SQLite-backed [`ArticleStore`].
//!
//! One row per article in the `articles` table (see [`crate::migrate`]).
//! Tags are stored as a JSON array in `tags_json`; timestamps as Unix
//! seconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Article, ArticleFields};

use super::{ArticleStore, StoreError, StoreResult};

const SELECT_COLUMNS: &str = "id, slug, title, body, excerpt, author, author_contact, \
     tags_json, featured, published, published_at, estimated_read_minutes, \
     source_path, content_hash, view_count, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Article> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row_to_article(&row)
    }
}

fn from_ts(field: &str, ts: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| StoreError::Internal(format!("{} out of range: {}", field, ts)))
}

fn tags_to_json(tags: &[String]) -> StoreResult<String> {
    serde_json::to_string(tags).map_err(|e| StoreError::Internal(e.to_string()))
}

fn row_to_article(row: &SqliteRow) -> StoreResult<Article> {
    let tags_json: String = row.try_get("tags_json")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| StoreError::Internal(format!("tags_json: {}", e)))?;
    let minutes: i64 = row.try_get("estimated_read_minutes")?;

    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        fields: ArticleFields {
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            excerpt: row.try_get("excerpt")?,
            author: row.try_get("author")?,
            author_contact: row.try_get("author_contact")?,
            tags,
            featured: row.try_get("featured")?,
            published: row.try_get("published")?,
            published_at: from_ts("published_at", row.try_get("published_at")?)?,
            estimated_read_minutes: minutes.clamp(1, u32::MAX as i64) as u32,
            source_path: row.try_get("source_path")?,
            content_hash: row.try_get("content_hash")?,
        },
        view_count: row.try_get("view_count")?,
        created_at: from_ts("created_at", row.try_get("created_at")?)?,
        updated_at: from_ts("updated_at", row.try_get("updated_at")?)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE slug = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn insert(&self, article: &Article) -> StoreResult<Article> {
        let f = &article.fields;
        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, slug, title, body, excerpt, author, author_contact,
                                  tags_json, featured, published, published_at,
                                  estimated_read_minutes, source_path, content_hash,
                                  view_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.id)
        .bind(&article.slug)
        .bind(&f.title)
        .bind(&f.body)
        .bind(&f.excerpt)
        .bind(&f.author)
        .bind(&f.author_contact)
        .bind(tags_to_json(&f.tags)?)
        .bind(f.featured)
        .bind(f.published)
        .bind(f.published_at.timestamp())
        .bind(f.estimated_read_minutes.max(1) as i64)
        .bind(&f.source_path)
        .bind(&f.content_hash)
        .bind(article.view_count)
        .bind(article.created_at.timestamp())
        .bind(article.updated_at.timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.find_by_id(&article.id).await,
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(article.slug.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, id: &str, fields: &ArticleFields) -> StoreResult<Article> {
        let result = sqlx::query(
            r#"
            UPDATE articles SET
                title = ?, body = ?, excerpt = ?, author = ?, author_contact = ?,
                tags_json = ?, featured = ?, published = ?, published_at = ?,
                estimated_read_minutes = ?, source_path = ?, content_hash = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.body)
        .bind(&fields.excerpt)
        .bind(&fields.author)
        .bind(&fields.author_contact)
        .bind(tags_to_json(&fields.tags)?)
        .bind(fields.featured)
        .bind(fields.published)
        .bind(fields.published_at.timestamp())
        .bind(fields.estimated_read_minutes.max(1) as i64)
        .bind(&fields.source_path)
        .bind(&fields.content_hash)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.find_by_id(id).await
    }

    async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list(&self) -> StoreResult<Vec<Article>> {
        let sql = format!("SELECT {} FROM articles ORDER BY slug", SELECT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_article).collect()
    }

    async fn set_tags(&self, id: &str, tags: &[String]) -> StoreResult<()> {
        let result = sqlx::query("UPDATE articles SET tags_json = ?, updated_at = ? WHERE id = ?")
            .bind(tags_to_json(tags)?)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn set_read_time(&self, id: &str, minutes: u32) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE articles SET estimated_read_minutes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(minutes.max(1) as i64)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM articles")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
