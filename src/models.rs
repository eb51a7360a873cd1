//! Core data models used throughout semdex.
//!
//! These types represent the documents, indexes, chunks, and search results
//! that flow through the indexing and retrieval pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Minimal document metadata mirrored from the host library.
///
/// The host owns the document; semdex only caches the fields needed for
/// display and filtering alongside the chunks it stores.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub document_id: i64,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub language: Option<String>,
}

/// Configuration under which a document's chunks and embeddings are stored.
///
/// The six fields together are unique per document in the store: the same
/// document may be indexed several times under different providers, models,
/// or chunking parameters, but never twice under the same combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub document_id: i64,
    pub provider: String,
    pub model_name: String,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// A persisted index row.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub index_id: i64,
    pub document_id: i64,
    pub provider: String,
    pub model_name: String,
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub total_chunks: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Typed chunk metadata with an escape hatch for provider-specific extras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Structural section label assigned by the argument-aware chunker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A chunk produced by a [`TextChunker`](crate::chunker::TextChunker),
/// before persistence.
///
/// `start_offset`/`end_offset` are byte offsets into the source text. When
/// the argument-aware chunker injects neighbor overlap, `text` is no longer
/// a verbatim substring of the source; the offsets still describe the core
/// span the chunk was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub position: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub metadata: ChunkMetadata,
}

/// Per-document indexing state machine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingState {
    Pending,
    Indexing,
    Completed,
    Error,
}

impl IndexingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingState::Pending => "pending",
            IndexingState::Indexing => "indexing",
            IndexingState::Completed => "completed",
            IndexingState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(IndexingState::Pending),
            "indexing" => Some(IndexingState::Indexing),
            "completed" => Some(IndexingState::Completed),
            "error" => Some(IndexingState::Error),
            _ => None,
        }
    }
}

/// One logical indexing status per document, overwritten on each attempt.
#[derive(Debug, Clone)]
pub struct IndexingStatus {
    pub document_id: i64,
    pub state: IndexingState,
    /// Progress fraction in [0, 1].
    pub progress: f64,
    pub error_message: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// A ranked similarity search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub document_id: i64,
    pub index_id: i64,
    pub position: i64,
    pub text: String,
    /// Cosine similarity to the query vector, in [-1, 1].
    pub similarity: f32,
    pub metadata: ChunkMetadata,
}

/// Chunk count and approximate storage footprint for one index.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStatistics {
    pub chunk_count: i64,
    /// Sum of chunk text and vector blob sizes in bytes.
    pub storage_bytes: i64,
}

/// Library-wide indexing coverage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryStatistics {
    pub total_documents: i64,
    pub indexed_documents: i64,
    pub total_chunks: i64,
    pub coverage_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_state_round_trips() {
        for state in [
            IndexingState::Pending,
            IndexingState::Indexing,
            IndexingState::Completed,
            IndexingState::Error,
        ] {
            assert_eq!(IndexingState::parse(state.as_str()), Some(state));
        }
        assert_eq!(IndexingState::parse("bogus"), None);
    }

    #[test]
    fn chunk_metadata_json_omits_empty_fields() {
        let meta = ChunkMetadata::default();
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, "{}");

        let meta = ChunkMetadata {
            title: Some("Critique".to_string()),
            tags: vec!["philosophy".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: ChunkMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
