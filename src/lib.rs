//! # Article Harness
//!
//! Ingests a directory of markdown articles, enriches each one with an
//! excerpt, a reading-time estimate and topical tags, and stores the result
//! for retrieval.
//!
//! Enrichment may call a remote language model; every AI-derived field also
//! has a deterministic local fallback, so a pass always completes without
//! network access.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────────────────────┐   ┌──────────┐
//! │ Orchestrator │──▶│ Parse → Synthesize → Enrich → Upsert │──▶│  Store   │
//! │ gate/status  │   │        (per-document pipeline)      │   │ SQLite   │
//! └──────┬───────┘   └─────────────────────────────────────┘   └──────────┘
//!        │
//!   ┌────┴─────┐
//!   ▼          ▼
//! ┌─────┐  ┌──────┐
//! │ CLI │  │ HTTP │
//! └─────┘  └──────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! articles init                 # create database
//! articles ingest               # load articles (gated)
//! articles ingest --force       # reload regardless of gate
//! articles get getting-started  # print one record
//! articles serve                # status server + startup load
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`text`] | Markup stripping and text helpers |
//! | [`frontmatter`] | Front-matter parsing |
//! | [`synthesize`] | Attribute synthesis (slug, excerpt, featured) |
//! | [`enrich`] | Read-time and tag enrichment with fallbacks |
//! | [`store`] | Persistence contract and backends |
//! | [`upsert`] | Idempotent insert-or-update |
//! | [`discover`] | Content-root discovery |
//! | [`pipeline`] | Per-document stages and post-passes |
//! | [`orchestrator`] | Ingestion state machine |
//! | [`server`] | Status HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod discover;
pub mod enrich;
pub mod frontmatter;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod server;
pub mod stats;
pub mod store;
pub mod synthesize;
pub mod text;
pub mod upsert;
