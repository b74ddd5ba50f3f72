//! TOML configuration parsing and validation.
//!
//! All settings live in one file (default `./config/articles.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/articles.sqlite"
//!
//! [content]
//! root = "./content"
//!
//! [pipeline]
//! load_on_startup = false
//! workers = 1
//!
//! [enrichment]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [taxonomy]
//! featured_keywords = ["getting-started", "onboarding"]
//!
//! [taxonomy.keywords]
//! rust = ["rust", "programming"]
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Only `[db]` and `[content]` are required; every other section has
//! defaults. See [`load_config`] for validation rules.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::enrich::tags::Taxonomy;

/// Environment variable that forces a load at startup regardless of the gate.
pub const FORCE_LOAD_ENV: &str = "ARTICLES_FORCE_LOAD";

/// Upper bound for a single remote enrichment request.
pub const MAX_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where source articles are discovered.
#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.markdown".to_string(),
        "**/*.txt".to_string(),
    ]
}

/// Orchestrator behaviour: the startup gate, worker pool and post-passes.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub load_on_startup: bool,
    #[serde(default)]
    pub clear_existing_before_load: bool,
    #[serde(default)]
    pub force_load_env_override: bool,
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_true")]
    pub backfill_tags: bool,
    #[serde(default = "default_true")]
    pub backfill_read_time: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            load_on_startup: false,
            clear_existing_before_load: false,
            force_load_env_override: false,
            startup_delay_ms: default_startup_delay_ms(),
            workers: default_workers(),
            backfill_tags: true,
            backfill_read_time: true,
        }
    }
}

fn default_startup_delay_ms() -> u64 {
    2000
}
fn default_workers() -> usize {
    1
}
fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// True when the force-load override is active, either from the config
    /// flag or from [`FORCE_LOAD_ENV`] holding a truthy value.
    pub fn force_load_requested(&self) -> bool {
        if self.force_load_env_override {
            return true;
        }
        match std::env::var(FORCE_LOAD_ENV) {
            Ok(v) => matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            Err(_) => false,
        }
    }
}

/// Remote language-model enrichment settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_true")]
    pub remote_read_time: bool,
    #[serde(default)]
    pub remote_tags: bool,
    #[serde(default = "default_subject_areas")]
    pub subject_areas: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            remote_read_time: true,
            remote_tags: false,
            subject_areas: default_subject_areas(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    2
}
fn default_subject_areas() -> Vec<String> {
    vec![
        "software engineering".to_string(),
        "developer tooling".to_string(),
        "infrastructure".to_string(),
        "data".to_string(),
    ]
}

impl EnrichmentConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Featured-keyword list and keyword → tags table. Empty values fall back
/// to the built-in seed in [`Taxonomy::default`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaxonomyConfig {
    #[serde(default)]
    pub featured_keywords: Vec<String>,
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl TaxonomyConfig {
    pub fn build(&self) -> Taxonomy {
        let seed = Taxonomy::default();
        let featured = if self.featured_keywords.is_empty() {
            seed.featured_keywords().to_vec()
        } else {
            self.featured_keywords.clone()
        };
        let keywords = if self.keywords.is_empty() {
            seed.keywords().clone()
        } else {
            self.keywords.clone()
        };
        Taxonomy::new(keywords, featured)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// A config rooted at the given paths with every other setting at its
    /// default. Used by tests and embedders that skip the TOML file.
    pub fn with_paths(db_path: impl Into<PathBuf>, content_root: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            content: ContentConfig {
                root: content_root.into(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                follow_symlinks: false,
            },
            pipeline: PipelineConfig::default(),
            enrichment: EnrichmentConfig::default(),
            taxonomy: TaxonomyConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.pipeline.workers == 0 {
        anyhow::bail!("pipeline.workers must be >= 1");
    }

    if config.enrichment.timeout_secs == 0 || config.enrichment.timeout_secs > MAX_TIMEOUT_SECS {
        anyhow::bail!(
            "enrichment.timeout_secs must be in [1, {}]",
            MAX_TIMEOUT_SECS
        );
    }

    match config.enrichment.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown enrichment provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.enrichment.is_enabled() && config.enrichment.model.is_none() {
        anyhow::bail!(
            "enrichment.model must be specified when provider is '{}'",
            config.enrichment.provider
        );
    }

    for (keyword, tags) in &config.taxonomy.keywords {
        if keyword.trim().is_empty() {
            anyhow::bail!("taxonomy.keywords contains an empty keyword");
        }
        if tags.iter().any(|t| t.trim().is_empty()) {
            anyhow::bail!("taxonomy.keywords.{} contains an empty tag", keyword);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse(
            r#"
            [db]
            path = "data/a.sqlite"
            [content]
            root = "content"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.enrichment.provider, "disabled");
        assert!(!cfg.enrichment.is_enabled());
        assert_eq!(cfg.pipeline.workers, 1);
        assert!(cfg.pipeline.backfill_tags);
        assert_eq!(cfg.content.include_globs.len(), 3);
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_enabled_provider_requires_model() {
        let err = parse(
            r#"
            [db]
            path = "a.sqlite"
            [content]
            root = "c"
            [enrichment]
            provider = "openai"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("enrichment.model"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse(
            r#"
            [db]
            path = "a.sqlite"
            [content]
            root = "c"
            [enrichment]
            provider = "carrier-pigeon"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown enrichment provider"));
    }

    #[test]
    fn test_timeout_capped() {
        let err = parse(
            r#"
            [db]
            path = "a.sqlite"
            [content]
            root = "c"
            [enrichment]
            timeout_secs = 120
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_taxonomy_override_replaces_seed() {
        let cfg = parse(
            r#"
            [db]
            path = "a.sqlite"
            [content]
            root = "c"
            [taxonomy]
            featured_keywords = ["welcome"]
            [taxonomy.keywords]
            sourdough = ["baking", "bread"]
            "#,
        )
        .unwrap();
        let taxonomy = cfg.taxonomy.build();
        assert_eq!(taxonomy.featured_keywords(), ["welcome".to_string()]);
        assert_eq!(taxonomy.keywords().len(), 1);
    }

    #[test]
    fn test_empty_taxonomy_uses_seed() {
        let taxonomy = TaxonomyConfig::default().build();
        assert!(!taxonomy.keywords().is_empty());
        assert!(!taxonomy.featured_keywords().is_empty());
    }
}
