//! In-memory [`ArticleStore`] for tests and embedders.
//!
//! Articles live in a `BTreeMap` keyed by slug behind `std::sync::RwLock`,
//! so [`list`](ArticleStore::list) comes out in slug order for free.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Article, ArticleFields};

use super::{ArticleStore, StoreError, StoreResult};

pub struct InMemoryStore {
    articles: RwLock<BTreeMap<String, Article>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            articles: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<String, Article>>> {
        self.articles
            .read()
            .map_err(|_| StoreError::Internal("article map lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<String, Article>>> {
        self.articles
            .write()
            .map_err(|_| StoreError::Internal("article map lock poisoned".to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn by_id<'a>(
    articles: &'a mut BTreeMap<String, Article>,
    id: &str,
) -> StoreResult<&'a mut Article> {
    articles
        .values_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

#[async_trait]
impl ArticleStore for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<Article>> {
        Ok(self.read()?.get(slug).cloned())
    }

    async fn insert(&self, article: &Article) -> StoreResult<Article> {
        let mut articles = self.write()?;
        if articles.contains_key(&article.slug) {
            return Err(StoreError::Conflict(article.slug.clone()));
        }
        articles.insert(article.slug.clone(), article.clone());
        Ok(article.clone())
    }

    async fn update(&self, id: &str, fields: &ArticleFields) -> StoreResult<Article> {
        let mut articles = self.write()?;
        let article = by_id(&mut articles, id)?;
        article.fields = fields.clone();
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.read()?.len() as i64)
    }

    async fn list(&self) -> StoreResult<Vec<Article>> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn set_tags(&self, id: &str, tags: &[String]) -> StoreResult<()> {
        let mut articles = self.write()?;
        let article = by_id(&mut articles, id)?;
        article.fields.tags = tags.to_vec();
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn set_read_time(&self, id: &str, minutes: u32) -> StoreResult<()> {
        let mut articles = self.write()?;
        let article = by_id(&mut articles, id)?;
        article.fields.estimated_read_minutes = minutes.max(1);
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn clear(&self) -> StoreResult<u64> {
        let mut articles = self.write()?;
        let removed = articles.len() as u64;
        articles.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_article;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryStore::new();
        store.insert(&sample_article("a")).await.unwrap();
        let found = store.find_by_slug("a").await.unwrap().unwrap();
        assert_eq!(found.slug, "a");
        assert!(store.find_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let store = InMemoryStore::new();
        store.insert(&sample_article("a")).await.unwrap();
        let err = store.insert(&sample_article("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(slug) if slug == "a"));
    }

    #[tokio::test]
    async fn test_update_preserves_identity() {
        let store = InMemoryStore::new();
        let mut original = sample_article("a");
        original.view_count = 5;
        store.insert(&original).await.unwrap();

        let mut fields = original.fields.clone();
        fields.title = "Changed".to_string();
        let updated = store.update(&original.id, &fields).await.unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.view_count, 5);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(updated.fields.title, "Changed");
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = InMemoryStore::new();
        let fields = sample_article("a").fields;
        assert!(matches!(
            store.update("nope", &fields).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_clear() {
        let store = InMemoryStore::new();
        for slug in ["c", "a", "b"] {
            store.insert(&sample_article(slug)).await.unwrap();
        }
        let slugs: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(slugs, vec!["a", "b", "c"]);
        assert_eq!(store.clear().await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
