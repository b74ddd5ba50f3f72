//! `articles ingest`: one ingestion pass from the command line.
//!
//! Without `--force` the startup gate applies, so the command is safe to run
//! from a container entrypoint: it loads an empty store and leaves a
//! populated one alone. `--dry-run` parses, synthesizes and enriches every
//! document with local fallbacks only and writes nothing.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::discover::{discover_documents, load_document};
use crate::enrich::provider::create_provider;
use crate::enrich::Enricher;
use crate::migrate::ensure_schema;
use crate::orchestrator::{GateDecision, Orchestrator, RunSummary, TriggerError};
use crate::pipeline::prepare_document;
use crate::store::sqlite::SqliteStore;

pub async fn run_ingest(config: &Config, force: bool, dry_run: bool) -> Result<()> {
    if dry_run {
        return run_dry(config).await;
    }

    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let provider = create_provider(&config.enrichment)?;
    let orchestrator = Orchestrator::new(config, store, provider);

    if !force {
        let decision = orchestrator.should_load().await?;
        if decision == GateDecision::Skip {
            println!("ingest skipped: articles already loaded (use --force to reload)");
            pool.close().await;
            return Ok(());
        }
    }

    let summary = match orchestrator.trigger().await {
        Ok(summary) => summary,
        Err(TriggerError::Failed(e)) => {
            pool.close().await;
            bail!("ingestion failed: {}", e);
        }
        Err(e) => {
            pool.close().await;
            bail!(e);
        }
    };

    print_summary(&summary);
    pool.close().await;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("ingest articles");
    println!("  discovered: {}", summary.discovered);
    println!("  processed: {}", summary.processed);
    println!("  inserted: {}", summary.inserted);
    println!("  updated: {}", summary.updated);
    println!("  unchanged: {}", summary.unchanged);
    println!("  failed: {}", summary.errors.len());
    for failure in &summary.errors {
        println!(
            "    {} [{}]: {}",
            failure.source_id, failure.kind, failure.message
        );
    }
    if let Some(report) = summary.tags_backfill {
        println!("  backfilled tags: {}", report.updated);
    }
    if let Some(report) = summary.read_time_backfill {
        println!("  backfilled read times: {}", report.updated);
    }
    if summary.cancelled {
        println!("cancelled");
    } else {
        println!("ok");
    }
}

async fn run_dry(config: &Config) -> Result<()> {
    let files = discover_documents(&config.content)?;
    let enricher = Enricher::fallback_only(config.taxonomy.build());

    println!("ingest articles (dry-run)");
    println!("  discovered: {}", files.len());

    let mut failed = 0usize;
    for file in &files {
        let prepared = match load_document(file) {
            Ok(doc) => prepare_document(&doc, &enricher).await,
            Err(e) => Err(e.into()),
        };
        match prepared {
            Ok(p) => {
                let featured = if p.fields.featured { " featured" } else { "" };
                println!(
                    "  {} -> {} ({} min{}) [{}]",
                    file.source_id,
                    p.slug,
                    p.fields.estimated_read_minutes,
                    featured,
                    p.fields.tags.join(", ")
                );
            }
            Err(e) => {
                failed += 1;
                println!("  {} [{}]: {}", file.source_id, e.kind(), e);
            }
        }
    }

    println!("  failed: {}", failed);
    println!("ok");
    Ok(())
}
