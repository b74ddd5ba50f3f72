//! Status HTTP server.
//!
//! Hosts an [`Orchestrator`] and exposes its status and trigger over JSON.
//! The startup task is launched when the server starts; stopping the server
//! (Ctrl-C) signals cancellation and waits for the in-flight pass.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Current [`PipelineStatus`](crate::orchestrator::PipelineStatus) |
//! | `POST` | `/trigger` | Start an ingestion pass (`202`, or `409` while one runs) |
//! | `GET`  | `/articles/{slug}` | Stored article record |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "already_running", "message": "an ingestion pass is already running" } }
//! ```
//!
//! Error codes: `not_found` (404), `already_running` (409), `stopped` (503),
//! `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::enrich::provider::create_provider;
use crate::migrate::ensure_schema;
use crate::models::Article;
use crate::orchestrator::{Orchestrator, PipelineStatus, TriggerError};
use crate::store::sqlite::SqliteStore;

/// Starts the status server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let provider = create_provider(&config.enrichment)?;
    let orchestrator = Arc::new(Orchestrator::new(config, store, provider));
    orchestrator.start();

    let app = router(orchestrator.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Article server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    orchestrator.stop().await;
    pool.close().await;
    Ok(())
}

/// Build the router over an existing orchestrator.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/trigger", post(handle_trigger))
        .route("/articles/{slug}", get(handle_get_article))
        .layer(cors)
        .with_state(orchestrator)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TriggerError> for AppError {
    fn from(err: TriggerError) -> Self {
        let (status, code) = match err {
            TriggerError::AlreadyRunning => (StatusCode::CONFLICT, "already_running"),
            TriggerError::Stopped => (StatusCode::SERVICE_UNAVAILABLE, "stopped"),
            TriggerError::Failed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_status(State(orchestrator): State<Arc<Orchestrator>>) -> Json<PipelineStatus> {
    Json(orchestrator.status())
}

#[derive(Serialize)]
struct TriggerResponse {
    status: &'static str,
}

async fn handle_trigger(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<(StatusCode, Json<TriggerResponse>), AppError> {
    orchestrator.trigger_background()?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse { status: "accepted" }),
    ))
}

async fn handle_get_article(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, AppError> {
    let article = orchestrator
        .store()
        .find_by_slug(&slug)
        .await
        .map_err(|e| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: e.to_string(),
        })?;

    article.map(Json).ok_or_else(|| AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: format!("no article with slug: {}", slug),
    })
}
