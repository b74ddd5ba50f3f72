//! Idempotent insert-or-update keyed by slug.
//!
//! [`upsert_article`] looks the slug up and either inserts a fresh record or
//! overwrites the content-derived fields of the existing one. Running the
//! same document twice yields one record with the same `id`, `created_at`
//! and `view_count`.
//!
//! Concurrent upserts on one slug are serialized by [`SlugLocks`]. If an
//! insert still loses a race (another process wrote the slug in between),
//! the [`StoreError::Conflict`] is resolved by updating the winner.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::{Article, ArticleFields};
use crate::store::{ArticleStore, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(Article),
    /// `changed` is false when the source content hash is unchanged.
    Updated { article: Article, changed: bool },
}

impl UpsertOutcome {
    pub fn article(&self) -> &Article {
        match self {
            UpsertOutcome::Inserted(article) => article,
            UpsertOutcome::Updated { article, .. } => article,
        }
    }
}

pub async fn upsert_article(
    store: &dyn ArticleStore,
    slug: &str,
    fields: ArticleFields,
) -> StoreResult<UpsertOutcome> {
    if let Some(existing) = store.find_by_slug(slug).await? {
        return update_existing(store, existing, &fields).await;
    }

    let now = Utc::now();
    let article = Article {
        id: uuid::Uuid::new_v4().to_string(),
        slug: slug.to_string(),
        fields,
        view_count: 0,
        created_at: now,
        updated_at: now,
    };

    match store.insert(&article).await {
        Ok(inserted) => Ok(UpsertOutcome::Inserted(inserted)),
        Err(StoreError::Conflict(_)) => {
            tracing::debug!(slug, "insert lost a race, updating existing record");
            let existing = store
                .find_by_slug(slug)
                .await?
                .ok_or_else(|| StoreError::NotFound(slug.to_string()))?;
            update_existing(store, existing, &article.fields).await
        }
        Err(e) => Err(e),
    }
}

async fn update_existing(
    store: &dyn ArticleStore,
    existing: Article,
    fields: &ArticleFields,
) -> StoreResult<UpsertOutcome> {
    let changed = existing.fields.content_hash != fields.content_hash;
    let article = store.update(&existing.id, fields).await?;
    Ok(UpsertOutcome::Updated { article, changed })
}

/// Per-slug async locks shared by the workers of one pass.
#[derive(Default, Clone)]
pub struct SlugLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl SlugLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `slug`.
    pub async fn lock(&self, slug: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks
                .entry(slug.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::tests::sample_article;

    #[tokio::test]
    async fn test_insert_then_update_is_idempotent() {
        let store = InMemoryStore::new();
        let fields = sample_article("s").fields;

        let first = upsert_article(&store, "s", fields.clone()).await.unwrap();
        let UpsertOutcome::Inserted(inserted) = first else {
            panic!("expected insert");
        };
        assert_eq!(inserted.view_count, 0);
        assert_eq!(inserted.created_at, inserted.updated_at);

        let second = upsert_article(&store, "s", fields).await.unwrap();
        match second {
            UpsertOutcome::Updated { article, changed } => {
                assert!(!changed);
                assert_eq!(article.id, inserted.id);
                assert_eq!(article.created_at, inserted.created_at);
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_view_count() {
        let store = InMemoryStore::new();
        let mut existing = sample_article("s");
        existing.view_count = 17;
        store.insert(&existing).await.unwrap();

        let mut fields = existing.fields.clone();
        fields.title = "New title".to_string();
        fields.content_hash = "ff".repeat(32);
        let outcome = upsert_article(&store, "s", fields).await.unwrap();

        let UpsertOutcome::Updated { article, changed } = outcome else {
            panic!("expected update");
        };
        assert!(changed);
        assert_eq!(article.view_count, 17);
        assert_eq!(article.id, existing.id);
        assert_eq!(article.fields.title, "New title");
    }

    #[tokio::test]
    async fn test_slug_locks_serialize() {
        let locks = SlugLocks::new();
        let guard = locks.lock("a").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("a").await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        // A different slug is not blocked.
        let _b = locks.lock("b").await;

        drop(guard);
        waiter.await.unwrap();
    }
}
