//! Per-document stages and the post-passes.
//!
//! Each document goes through two phases:
//!
//! 1. **Compute** ([`prepare_document`]): parse, synthesize, enrich. Remote
//!    calls happen here and never touch the store.
//! 2. **Commit** ([`commit_article`]): take the slug lock, reconcile with any
//!    existing record, upsert.
//!
//! After all documents, the orchestrator may run [`backfill_tags`] and
//! [`backfill_read_time`] over every persisted article.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::discover::{load_document, DiscoveredFile};
use crate::enrich::read_time::read_time_fallback;
use crate::enrich::{EnrichmentSource, Enricher};
use crate::frontmatter::{parse_document, ParseError};
use crate::models::{Article, ArticleFields, SourceDocument};
use crate::store::{ArticleStore, StoreError, StoreResult};
use crate::synthesize::synthesize;
use crate::upsert::{upsert_article, SlugLocks, UpsertOutcome};

/// A stored read time at or below this is re-estimated when the local
/// estimate reaches [`SUSPICIOUS_FALLBACK_MINUTES`].
pub const SUSPICIOUS_STORED_MINUTES: u32 = 1;
pub const SUSPICIOUS_FALLBACK_MINUTES: u32 = 3;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read document: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DocumentError {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Read(_) => "read",
            DocumentError::Parse(_) => "parse",
            DocumentError::Store(_) => "store",
        }
    }
}

/// Shared handles for one ingestion pass.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn ArticleStore>,
    pub enricher: Enricher,
    pub slug_locks: SlugLocks,
}

impl PipelineContext {
    pub fn new(store: Arc<dyn ArticleStore>, enricher: Enricher) -> Self {
        Self {
            store,
            enricher,
            slug_locks: SlugLocks::new(),
        }
    }
}

/// Result of the compute phase, ready to commit.
#[derive(Debug, Clone)]
pub struct PreparedArticle {
    pub slug: String,
    pub fields: ArticleFields,
    /// False when `published_at` was defaulted to "now" rather than declared.
    pub published_at_declared: bool,
    /// `None` when the document declared its own read time.
    pub read_time_source: Option<EnrichmentSource>,
    /// `None` when the document declared its own tags.
    pub tags_source: Option<EnrichmentSource>,
}

/// Parse, synthesize and enrich one document without touching the store.
pub async fn prepare_document(
    doc: &SourceDocument,
    enricher: &Enricher,
) -> Result<PreparedArticle, DocumentError> {
    let (meta, body) = parse_document(&doc.content)?;
    let published_at_declared = meta.published_at.is_some();
    let mut attrs = synthesize(meta, body, doc, enricher.taxonomy().featured_keywords());

    let (minutes, read_time_source) = match attrs.estimated_read_minutes {
        Some(declared) => (declared, None),
        None => {
            let enriched = enricher.read_time(&attrs.body).await;
            log_fallback(&attrs.slug, "read_time", enriched.source);
            (enriched.value, Some(enriched.source))
        }
    };

    let tags_source = if attrs.tags.is_empty() {
        let enriched = enricher
            .tags(&attrs.title, &attrs.excerpt, &attrs.body)
            .await;
        log_fallback(&attrs.slug, "tags", enriched.source);
        attrs.tags = enriched.value;
        Some(enriched.source)
    } else {
        None
    };

    let (slug, fields) = attrs.into_fields(minutes);
    Ok(PreparedArticle {
        slug,
        fields,
        published_at_declared,
        read_time_source,
        tags_source,
    })
}

/// Upsert a prepared article while holding its slug lock.
pub async fn commit_article(
    ctx: &PipelineContext,
    prepared: PreparedArticle,
) -> Result<UpsertOutcome, DocumentError> {
    let _guard = ctx.slug_locks.lock(&prepared.slug).await;

    let mut fields = prepared.fields;
    if !prepared.published_at_declared {
        if let Some(existing) = ctx.store.find_by_slug(&prepared.slug).await? {
            fields.published_at = existing.fields.published_at;
        }
    }

    let outcome = upsert_article(ctx.store.as_ref(), &prepared.slug, fields).await?;
    let article = outcome.article();
    match &outcome {
        UpsertOutcome::Inserted(_) => {
            tracing::info!(slug = %article.slug, id = %article.id, "article inserted");
        }
        UpsertOutcome::Updated { changed, .. } => {
            tracing::info!(slug = %article.slug, changed, "article updated");
        }
    }
    Ok(outcome)
}

/// Read, prepare and commit one discovered file.
pub async fn process_file(
    ctx: &PipelineContext,
    file: &DiscoveredFile,
) -> Result<UpsertOutcome, DocumentError> {
    let doc = load_document(file)?;
    let prepared = prepare_document(&doc, &ctx.enricher).await?;
    commit_article(ctx, prepared).await
}

fn log_fallback(slug: &str, field: &str, source: EnrichmentSource) {
    if let EnrichmentSource::Fallback(reason) = source {
        tracing::debug!(slug, field, reason = %reason, "local fallback value used");
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub examined: usize,
    pub updated: usize,
    pub fallbacks: usize,
}

/// Fill in tags for every article whose tag set is empty.
pub async fn backfill_tags(
    store: &dyn ArticleStore,
    enricher: &Enricher,
) -> StoreResult<BackfillReport> {
    let mut report = BackfillReport::default();

    for article in store.list().await? {
        if !article.fields.tags.is_empty() {
            continue;
        }
        report.examined += 1;

        let f = &article.fields;
        let enriched = enricher.tags(&f.title, &f.excerpt, &f.body).await;
        log_fallback(&article.slug, "tags", enriched.source);
        if enriched.source.is_fallback() {
            report.fallbacks += 1;
        }
        if enriched.value.is_empty() {
            continue;
        }

        store.set_tags(&article.id, &enriched.value).await?;
        report.updated += 1;
    }

    if report.updated > 0 {
        tracing::info!(updated = report.updated, "backfilled tags");
    }
    Ok(report)
}

/// A stored read time is suspicious when it is zero, or at the minimum
/// while the body is long enough for a multi-minute estimate.
pub fn read_time_is_suspicious(article: &Article) -> bool {
    let minutes = article.fields.estimated_read_minutes;
    minutes == 0
        || (minutes <= SUSPICIOUS_STORED_MINUTES
            && read_time_fallback(&article.fields.body) >= SUSPICIOUS_FALLBACK_MINUTES)
}

/// Re-estimate read time for every article with a missing or suspicious value.
pub async fn backfill_read_time(
    store: &dyn ArticleStore,
    enricher: &Enricher,
) -> StoreResult<BackfillReport> {
    let mut report = BackfillReport::default();

    for article in store.list().await? {
        if !read_time_is_suspicious(&article) {
            continue;
        }
        report.examined += 1;

        let enriched = enricher.read_time(&article.fields.body).await;
        log_fallback(&article.slug, "read_time", enriched.source);
        if enriched.source.is_fallback() {
            report.fallbacks += 1;
        }
        if enriched.value == article.fields.estimated_read_minutes {
            continue;
        }

        store.set_read_time(&article.id, enriched.value).await?;
        report.updated += 1;
    }

    if report.updated > 0 {
        tracing::info!(updated = report.updated, "backfilled read times");
    }
    Ok(report)
}
