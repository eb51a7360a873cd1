//! The host document library boundary.
//!
//! The indexing core never owns documents; it consumes them through
//! [`DocumentLibrary`]. Hosts embed semdex by implementing this trait over
//! their own collection. [`FsLibrary`] is the built-in implementation over
//! a directory of text/markdown files so the CLI works standalone.

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::LibraryConfig;
use crate::models::DocumentInfo;

/// Read-only access to the host's document collection.
#[async_trait]
pub trait DocumentLibrary: Send + Sync {
    /// Metadata for one document.
    async fn get_document_metadata(&self, document_id: i64) -> Result<DocumentInfo>;

    /// Full text of one document. An empty string is a valid outcome
    /// (extraction impossible); the pipeline treats it as a validation
    /// failure, not an error here.
    async fn get_document_text(
        &self,
        document_id: i64,
        preferred_format: Option<&str>,
    ) -> Result<String>;

    /// All document identifiers in the library.
    async fn list_document_ids(&self) -> Result<Vec<i64>>;
}

/// A document library over a directory tree of plain-text files.
///
/// Document ids are assigned by sorted relative path at construction, so
/// they are deterministic for an unchanged tree.
pub struct FsLibrary {
    documents: BTreeMap<i64, PathBuf>,
}

impl FsLibrary {
    pub fn open(config: &LibraryConfig) -> Result<Self> {
        if !config.root.exists() {
            anyhow::bail!("library root does not exist: {}", config.root.display());
        }

        let include_set = build_globset(&config.include_globs)?;
        let exclude_set = build_globset(&config.exclude_globs)?;

        let mut paths = Vec::new();
        for entry in WalkDir::new(&config.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&config.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            paths.push((rel_str, path.to_path_buf()));
        }

        // Sort for deterministic id assignment
        paths.sort_by(|a, b| a.0.cmp(&b.0));

        let documents = paths
            .into_iter()
            .enumerate()
            .map(|(i, (_, path))| (i as i64 + 1, path))
            .collect();

        Ok(Self { documents })
    }

    fn path_for(&self, document_id: i64) -> Result<&PathBuf> {
        self.documents
            .get(&document_id)
            .ok_or_else(|| anyhow::anyhow!("unknown document id: {document_id}"))
    }
}

#[async_trait]
impl DocumentLibrary for FsLibrary {
    async fn get_document_metadata(&self, document_id: i64) -> Result<DocumentInfo> {
        let path = self.path_for(document_id)?;
        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(DocumentInfo {
            document_id,
            title: Some(title),
            authors: Vec::new(),
            tags: Vec::new(),
            language: None,
        })
    }

    async fn get_document_text(
        &self,
        document_id: i64,
        _preferred_format: Option<&str>,
    ) -> Result<String> {
        let path = self.path_for(document_id)?;
        // Unreadable content maps to empty text, which the pipeline reports
        // as a validation failure for that document.
        Ok(std::fs::read_to_string(path).unwrap_or_default())
    }

    async fn list_document_ids(&self) -> Result<Vec<i64>> {
        Ok(self.documents.keys().copied().collect())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
