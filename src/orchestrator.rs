//! Pipeline orchestrator: the ingestion state machine.
//!
//! ```text
//!                 gate = skip
//! Initializing ───────────────▶ Disabled
//!      │ gate = load                │
//!      ▼                            │ trigger()
//!   Loading ◀───────────────────────┘
//!    │    │        ▲
//!    ▼    ▼        │ trigger()
//! Loaded  Error ───┘
//! ```
//!
//! An [`Orchestrator`] is constructed explicitly by the host and owns the
//! store handle, the enricher and the status record. [`Orchestrator::start`]
//! spawns the startup task (delay, gate, first pass); [`Orchestrator::trigger`]
//! runs a pass on demand. Passes are mutually exclusive: a trigger while one
//! is in flight fails with [`TriggerError::AlreadyRunning`].
//!
//! Within a pass, documents are processed by up to `pipeline.workers`
//! concurrent tasks. A failing document is recorded and skipped; only a
//! missing content root, a discovery failure, a store failure outside
//! per-document work, or a panicking task moves the pass to `Error`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::config::{Config, ContentConfig, PipelineConfig};
use crate::discover::{discover_documents, DiscoveryError};
use crate::enrich::provider::CompletionProvider;
use crate::enrich::Enricher;
use crate::pipeline::{
    backfill_read_time, backfill_tags, process_file, BackfillReport, DocumentError,
    PipelineContext,
};
use crate::store::{ArticleStore, StoreError};
use crate::upsert::UpsertOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Initializing,
    Disabled,
    Loading,
    Loaded,
    Error,
}

/// One document (or post-pass) that failed during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    pub source_id: String,
    pub kind: String,
    pub message: String,
}

/// Counters and failures for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<DocumentFailure>,
    pub tags_backfill: Option<BackfillReport>,
    pub read_time_backfill: Option<BackfillReport>,
    pub cancelled: bool,
}

/// Snapshot returned by [`Orchestrator::status`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub last_run_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    #[serde(flatten)]
    pub run: RunSummary,
}

impl PipelineStatus {
    fn initial() -> Self {
        Self {
            state: PipelineState::Initializing,
            last_run_at: None,
            finished_at: None,
            message: None,
            run: RunSummary::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("content root does not exist: {}", .0.display())]
    RootMissing(PathBuf),
    #[error("document discovery failed: {0}")]
    Discovery(String),
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("document task panicked: {0}")]
    TaskPanicked(String),
}

impl From<DiscoveryError> for PipelineError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::RootMissing(path) => PipelineError::RootMissing(path),
            other => PipelineError::Discovery(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("an ingestion pass is already running")]
    AlreadyRunning,
    #[error("orchestrator has been stopped")]
    Stopped,
    #[error(transparent)]
    Failed(#[from] PipelineError),
}

/// Why the startup gate did or did not open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// `pipeline.load_on_startup` is set.
    Configured,
    /// The force-load flag or environment variable is set.
    EnvOverride,
    /// The store holds no articles yet.
    EmptyStore,
    Skip,
}

impl GateDecision {
    pub fn should_load(self) -> bool {
        self != GateDecision::Skip
    }
}

pub struct Orchestrator {
    inner: Arc<Inner>,
    startup: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    content: ContentConfig,
    pipeline: PipelineConfig,
    store: Arc<dyn ArticleStore>,
    enricher: Enricher,
    status: RwLock<PipelineStatus>,
    run_lock: Arc<AsyncMutex<()>>,
    shutdown: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        store: Arc<dyn ArticleStore>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let enricher = Enricher::new(provider, config.taxonomy.build(), &config.enrichment);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                content: config.content.clone(),
                pipeline: config.pipeline.clone(),
                store,
                enricher,
                status: RwLock::new(PipelineStatus::initial()),
                run_lock: Arc::new(AsyncMutex::new(())),
                shutdown,
            }),
            startup: Mutex::new(None),
        }
    }

    /// Spawn the startup task: wait `startup_delay_ms`, evaluate the gate,
    /// then run the first pass or settle in `Disabled`. Calling `start`
    /// twice has no further effect.
    pub fn start(&self) {
        let mut startup = match self.startup.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if startup.is_some() {
            return;
        }

        let inner = self.inner.clone();
        *startup = Some(tokio::spawn(async move {
            let mut shutdown = inner.shutdown.subscribe();
            let delay = Duration::from_millis(inner.pipeline.startup_delay_ms);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait_for(|stopped| *stopped) => {
                    tracing::debug!("stopped before startup gate");
                    return;
                }
            }
            inner.startup_pass().await;
        }));
    }

    /// Signal cancellation, wait for the startup task and for any in-flight
    /// pass to finish its current documents.
    pub async fn stop(&self) {
        self.inner.shutdown.send_replace(true);

        let handle = match self.startup.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "startup task failed");
            }
        }

        let _idle = self.inner.run_lock.lock().await;
        tracing::info!("orchestrator stopped");
    }

    pub fn status(&self) -> PipelineStatus {
        self.inner.status_snapshot()
    }

    /// Evaluate the startup gate without running anything.
    pub async fn should_load(&self) -> Result<GateDecision, StoreError> {
        self.inner.gate().await
    }

    /// Run a pass now and wait for it.
    pub async fn trigger(&self) -> Result<RunSummary, TriggerError> {
        let guard = self.inner.begin()?;
        self.inner.run_locked(guard).await
    }

    /// Start a pass in the background. Fails immediately when a pass is
    /// already running or the orchestrator is stopped.
    pub fn trigger_background(&self) -> Result<(), TriggerError> {
        let guard = self.inner.begin()?;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _ = inner.run_locked(guard).await;
        });
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.inner.store
    }
}

impl Inner {
    fn status_snapshot(&self) -> PipelineStatus {
        match self.status.read() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut PipelineStatus)) {
        match self.status.write() {
            Ok(mut status) => f(&mut status),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn is_stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn gate(&self) -> Result<GateDecision, StoreError> {
        if self.pipeline.load_on_startup {
            return Ok(GateDecision::Configured);
        }
        if self.pipeline.force_load_requested() {
            return Ok(GateDecision::EnvOverride);
        }
        if self.store.count().await? == 0 {
            return Ok(GateDecision::EmptyStore);
        }
        Ok(GateDecision::Skip)
    }

    async fn startup_pass(&self) {
        let decision = match self.gate().await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(error = %e, "startup gate evaluation failed");
                self.update_status(|s| {
                    s.state = PipelineState::Error;
                    s.message = Some(format!("gate evaluation failed: {}", e));
                });
                return;
            }
        };

        if !decision.should_load() {
            tracing::info!("articles already loaded, skipping startup ingestion");
            self.update_status(|s| {
                s.state = PipelineState::Disabled;
                s.message = Some("startup load skipped: store already populated".to_string());
            });
            return;
        }

        tracing::info!(reason = ?decision, "starting startup ingestion");
        match self.begin() {
            Ok(guard) => {
                let _ = self.run_locked(guard).await;
            }
            Err(e) => tracing::info!(error = %e, "startup ingestion not started"),
        }
    }

    /// Claim the run lock and move to `Loading`.
    fn begin(&self) -> Result<OwnedMutexGuard<()>, TriggerError> {
        if self.is_stopping() {
            return Err(TriggerError::Stopped);
        }
        let guard = self
            .run_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| TriggerError::AlreadyRunning)?;

        self.update_status(|s| {
            s.state = PipelineState::Loading;
            s.last_run_at = Some(Utc::now());
            s.finished_at = None;
            s.message = None;
            s.run = RunSummary::default();
        });
        Ok(guard)
    }

    async fn run_locked(&self, _guard: OwnedMutexGuard<()>) -> Result<RunSummary, TriggerError> {
        let result = self.execute().await;
        let finished = Utc::now();

        match result {
            Ok(summary) => {
                tracing::info!(
                    processed = summary.processed,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    failed = summary.errors.len(),
                    cancelled = summary.cancelled,
                    "ingestion pass finished"
                );
                self.update_status(|s| {
                    s.state = PipelineState::Loaded;
                    s.finished_at = Some(finished);
                    s.message = summary.cancelled.then(|| "pass cancelled".to_string());
                    s.run = summary.clone();
                });
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "ingestion pass failed");
                self.update_status(|s| {
                    s.state = PipelineState::Error;
                    s.finished_at = Some(finished);
                    s.message = Some(e.to_string());
                });
                Err(TriggerError::Failed(e))
            }
        }
    }

    async fn execute(&self) -> Result<RunSummary, PipelineError> {
        let files = discover_documents(&self.content)?;
        let mut summary = RunSummary {
            discovered: files.len(),
            ..Default::default()
        };
        self.update_status(|s| s.run.discovered = files.len());
        tracing::info!(
            root = %self.content.root.display(),
            count = files.len(),
            provider = self.enricher.provider_name(),
            "documents discovered"
        );

        if self.pipeline.clear_existing_before_load {
            let removed = self.store.clear().await?;
            tracing::warn!(removed, "cleared existing articles before load");
        }

        let ctx = PipelineContext::new(self.store.clone(), self.enricher.clone());
        let workers = self.pipeline.workers.max(1);
        let mut tasks = JoinSet::new();

        for file in files {
            while tasks.len() >= workers {
                if let Some(joined) = tasks.join_next().await {
                    self.record(&mut summary, joined)?;
                }
            }
            if self.is_stopping() {
                summary.cancelled = true;
                break;
            }

            let ctx = ctx.clone();
            tasks.spawn(async move {
                let result = process_file(&ctx, &file).await;
                (file.source_id, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            self.record(&mut summary, joined)?;
        }

        if summary.cancelled || self.is_stopping() {
            summary.cancelled = true;
            tracing::info!("pass cancelled, skipping post-passes");
            return Ok(summary);
        }

        if self.pipeline.backfill_tags {
            match backfill_tags(self.store.as_ref(), &self.enricher).await {
                Ok(report) => summary.tags_backfill = Some(report),
                Err(e) => summary.errors.push(post_pass_failure("backfill_tags", &e)),
            }
        }
        if self.pipeline.backfill_read_time {
            match backfill_read_time(self.store.as_ref(), &self.enricher).await {
                Ok(report) => summary.read_time_backfill = Some(report),
                Err(e) => summary.errors.push(post_pass_failure("backfill_read_time", &e)),
            }
        }

        Ok(summary)
    }

    fn record(
        &self,
        summary: &mut RunSummary,
        joined: Result<(String, Result<UpsertOutcome, DocumentError>), JoinError>,
    ) -> Result<(), PipelineError> {
        let (source_id, result) = joined.map_err(|e| PipelineError::TaskPanicked(e.to_string()))?;

        match result {
            Ok(UpsertOutcome::Inserted(_)) => summary.inserted += 1,
            Ok(UpsertOutcome::Updated { changed: true, .. }) => summary.updated += 1,
            Ok(UpsertOutcome::Updated { changed: false, .. }) => summary.unchanged += 1,
            Err(e) => {
                tracing::warn!(source_id = %source_id, kind = e.kind(), error = %e, "document failed");
                summary.errors.push(DocumentFailure {
                    source_id,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        }
        summary.processed += 1;

        let progress = summary.clone();
        self.update_status(|s| s.run = progress);
        Ok(())
    }
}

fn post_pass_failure(pass: &str, err: &StoreError) -> DocumentFailure {
    tracing::warn!(pass, error = %err, "post-pass failed");
    DocumentFailure {
        source_id: format!("<{}>", pass),
        kind: "post_pass".to_string(),
        message: err.to_string(),
    }
}
