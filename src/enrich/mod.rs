//! AI enrichment with deterministic local fallbacks.
//!
//! Every derived field follows the same shape: try the remote
//! [`CompletionProvider`], validate its reply, and on any failure compute the
//! value locally. The caller always gets a value back, tagged with where it
//! came from:
//!
//! | Field | Remote path | Fallback |
//! |-------|-------------|----------|
//! | read time | [`read_time::prompt`] → [`read_time::parse_minutes`] | [`read_time::read_time_fallback`] |
//! | tags | [`tags::prompt`] → [`tags::parse_tag_response`] | [`tags::tags_fallback`] |
//!
//! Fallbacks caused by configuration (disabled provider, missing key) log at
//! `debug`; remote failures and invalid replies log at `warn`.

pub mod provider;
pub mod read_time;
pub mod tags;

use std::fmt;
use std::sync::Arc;

use crate::config::EnrichmentConfig;
use provider::{CompletionError, CompletionProvider, DisabledProvider};
use tags::Taxonomy;

/// Why a fallback value was used instead of a remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Remote enrichment is switched off for this field or globally.
    Disabled,
    /// The provider is configured but cannot be used (e.g. no API key).
    Unavailable,
    /// The remote call failed (transport, HTTP status, timeout).
    Failed,
    /// The remote call succeeded but the reply did not validate.
    Invalid,
}

impl From<&CompletionError> for FallbackReason {
    fn from(err: &CompletionError) -> Self {
        match err {
            CompletionError::Disabled => FallbackReason::Disabled,
            CompletionError::MissingCredentials(_) => FallbackReason::Unavailable,
            CompletionError::Malformed(_) => FallbackReason::Invalid,
            CompletionError::Transport(_) | CompletionError::Status { .. } => {
                FallbackReason::Failed
            }
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FallbackReason::Disabled => "disabled",
            FallbackReason::Unavailable => "unavailable",
            FallbackReason::Failed => "failed",
            FallbackReason::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentSource {
    Remote,
    Fallback(FallbackReason),
}

impl EnrichmentSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, EnrichmentSource::Fallback(_))
    }
}

/// A derived value and its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched<T> {
    pub value: T,
    pub source: EnrichmentSource,
}

impl<T> Enriched<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            source: EnrichmentSource::Remote,
        }
    }

    fn fallback(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            source: EnrichmentSource::Fallback(reason),
        }
    }
}

/// Shared enrichment front-end used by the pipeline and the post-passes.
#[derive(Clone)]
pub struct Enricher {
    provider: Arc<dyn CompletionProvider>,
    taxonomy: Arc<Taxonomy>,
    remote_read_time: bool,
    remote_tags: bool,
    subject_areas: Vec<String>,
}

impl Enricher {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        taxonomy: Taxonomy,
        config: &EnrichmentConfig,
    ) -> Self {
        Self {
            provider,
            taxonomy: Arc::new(taxonomy),
            remote_read_time: config.remote_read_time,
            remote_tags: config.remote_tags,
            subject_areas: config.subject_areas.clone(),
        }
    }

    /// An enricher that never leaves the process.
    pub fn fallback_only(taxonomy: Taxonomy) -> Self {
        Self {
            provider: Arc::new(DisabledProvider),
            taxonomy: Arc::new(taxonomy),
            remote_read_time: false,
            remote_tags: false,
            subject_areas: Vec::new(),
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Estimated reading time in whole minutes, always ≥ 1.
    pub async fn read_time(&self, body: &str) -> Enriched<u32> {
        if !self.remote_read_time {
            return Enriched::fallback(
                read_time::read_time_fallback(body),
                FallbackReason::Disabled,
            );
        }

        match self.provider.complete(&read_time::prompt(body)).await {
            Ok(reply) => match read_time::parse_minutes(&reply) {
                Some(minutes) => Enriched::remote(minutes),
                None => {
                    tracing::warn!(
                        provider = self.provider.name(),
                        reply = %reply.trim(),
                        "read time reply rejected, using word-count estimate"
                    );
                    Enriched::fallback(
                        read_time::read_time_fallback(body),
                        FallbackReason::Invalid,
                    )
                }
            },
            Err(e) => {
                self.log_failure("read_time", &e);
                Enriched::fallback(read_time::read_time_fallback(body), (&e).into())
            }
        }
    }

    /// Up to [`crate::models::MAX_TAGS`] topical tags for an article.
    pub async fn tags(&self, title: &str, excerpt: &str, body: &str) -> Enriched<Vec<String>> {
        let local = || {
            let text = format!("{}\n{}\n{}", title, excerpt, body);
            tags::tags_fallback(&text, &self.taxonomy)
        };

        if !self.remote_tags {
            return Enriched::fallback(local(), FallbackReason::Disabled);
        }

        let prompt = tags::prompt(title, excerpt, body, &self.subject_areas);
        match self.provider.complete(&prompt).await {
            Ok(reply) => match tags::parse_tag_response(&reply) {
                Ok(tags) => Enriched::remote(tags),
                Err(reason) => {
                    tracing::warn!(
                        provider = self.provider.name(),
                        reason = %reason,
                        "tag reply rejected, using keyword taxonomy"
                    );
                    Enriched::fallback(local(), FallbackReason::Invalid)
                }
            },
            Err(e) => {
                self.log_failure("tags", &e);
                Enriched::fallback(local(), (&e).into())
            }
        }
    }

    fn log_failure(&self, field: &str, err: &CompletionError) {
        if err.is_expected() {
            tracing::debug!(
                provider = self.provider.name(),
                field,
                error = %err,
                "remote enrichment unavailable, using fallback"
            );
        } else {
            tracing::warn!(
                provider = self.provider.name(),
                field,
                error = %err,
                "remote enrichment failed, using fallback"
            );
        }
    }
}
