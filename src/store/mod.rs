//! Persistence contract for articles.
//!
//! The [`ArticleStore`] trait is the only way the pipeline touches durable
//! state. Two backends ship with the crate:
//!
//! - [`memory::InMemoryStore`]: `BTreeMap` behind a `RwLock`, for tests and
//!   embedding.
//! - [`sqlite::SqliteStore`]: the `articles` table in the SQLite database
//!   created by [`crate::migrate`].
//!
//! Implementations must be `Send + Sync`; the orchestrator shares one
//! `Arc<dyn ArticleStore>` across all worker tasks.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Article, ArticleFields};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("article not found: {0}")]
    NotFound(String),
    #[error("slug already exists: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract article storage.
///
/// # Operations
///
/// | Method | Used by |
/// |--------|---------|
/// | [`find_by_slug`](ArticleStore::find_by_slug) | upsert, `get`, HTTP lookup |
/// | [`insert`](ArticleStore::insert) | upsert (new slug) |
/// | [`update`](ArticleStore::update) | upsert (existing slug) |
/// | [`count`](ArticleStore::count) | startup gate, `stats` |
/// | [`list`](ArticleStore::list) | post-passes, `stats` |
/// | [`set_tags`](ArticleStore::set_tags) / [`set_read_time`](ArticleStore::set_read_time) | post-passes |
/// | [`clear`](ArticleStore::clear) | `clear_existing_before_load` |
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Article>>;

    /// Persist a new article. Fails with [`StoreError::Conflict`] when the
    /// slug is already taken.
    async fn insert(&self, article: &Article) -> StoreResult<Article>;

    /// Overwrite the content-derived fields of an existing article and
    /// advance `updated_at`. `id`, `slug`, `created_at` and `view_count` are
    /// left untouched.
    async fn update(&self, id: &str, fields: &ArticleFields) -> StoreResult<Article>;

    async fn count(&self) -> StoreResult<i64>;

    /// All articles ordered by slug.
    async fn list(&self) -> StoreResult<Vec<Article>>;

    async fn set_tags(&self, id: &str, tags: &[String]) -> StoreResult<()>;

    async fn set_read_time(&self, id: &str, minutes: u32) -> StoreResult<()>;

    /// Delete every article, returning how many were removed.
    async fn clear(&self) -> StoreResult<u64>;
}
