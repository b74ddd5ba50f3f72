//! Content-root discovery.
//!
//! Walks `content.root` and returns every file matching the include globs
//! and none of the exclude globs. `.git`, `target` and `node_modules` are
//! always excluded. Paths are matched relative to the root and results are
//! sorted by relative path.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::ContentConfig;
use crate::models::SourceDocument;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("content root does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
    #[error("failed to walk content root: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A file found under the content root, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path relative to the content root, `/`-separated.
    pub source_id: String,
    pub path: PathBuf,
}

pub fn discover_documents(config: &ContentConfig) -> Result<Vec<DiscoveredFile>, DiscoveryError> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(DiscoveryError::RootMissing(root.clone()));
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(DiscoveredFile {
            source_id: rel_str,
            path: path.to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    tracing::debug!(root = %root.display(), count = files.len(), "discovered documents");

    Ok(files)
}

/// Read a discovered file. Invalid UTF-8 is replaced rather than rejected.
pub fn load_document(file: &DiscoveredFile) -> std::io::Result<SourceDocument> {
    let bytes = std::fs::read(&file.path)?;
    Ok(SourceDocument {
        source_id: file.source_id.clone(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
