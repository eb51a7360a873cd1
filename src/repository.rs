//! Index lifecycle operations over the vector store.
//!
//! The repository is the surface the pipeline and CLI talk to: it owns
//! index creation semantics (strict vs. idempotent) and cross-index
//! search merging, delegating persistence to [`VectorStore`].

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{IndexConfig, IndexRecord, IndexStatistics, SearchResult};
use crate::store::{SearchFilters, VectorStore};

pub struct IndexRepository {
    store: Arc<VectorStore>,
}

impl IndexRepository {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Create a new index, failing with [`Error::Conflict`] if one already
    /// exists under the same configuration.
    pub async fn create_index(&self, config: &IndexConfig) -> Result<IndexRecord> {
        self.store.create_index(config).await
    }

    /// Return the existing index for this configuration, creating it if
    /// absent. Used by the pipeline so reindexing reuses the index row.
    pub async fn ensure_index(&self, config: &IndexConfig) -> Result<IndexRecord> {
        if let Some(existing) = self.store.find_index(config).await? {
            return Ok(existing);
        }
        match self.store.create_index(config).await {
            // Lost a race with a concurrent creator; the row exists now.
            Err(Error::Conflict(_)) => self
                .store
                .find_index(config)
                .await?
                .ok_or_else(|| Error::Conflict("index vanished during creation".to_string())),
            other => other,
        }
    }

    pub async fn delete_index(&self, index_id: i64) -> Result<bool> {
        self.store.delete_index(index_id).await
    }

    pub async fn get_index(&self, index_id: i64) -> Result<Option<IndexRecord>> {
        self.store.get_index(index_id).await
    }

    pub async fn get_indexes_for_document(&self, document_id: i64) -> Result<Vec<IndexRecord>> {
        self.store.indexes_for_document(document_id).await
    }

    pub async fn get_indexes_by_provider(&self, provider: &str) -> Result<Vec<IndexRecord>> {
        self.store.indexes_by_provider(provider).await
    }

    pub async fn get_index_statistics(&self, index_id: i64) -> Result<IndexStatistics> {
        self.store.index_statistics(index_id).await
    }

    /// Search several indexes and merge into one ranked list.
    ///
    /// Each index is asked for `limit` results so the merged head is
    /// complete even when one index dominates; ranking and tie-breaks
    /// match the single-index path.
    pub async fn search_across_indexes(
        &self,
        index_ids: &[i64],
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let mut merged = Vec::new();
        for &index_id in index_ids {
            let results = self
                .store
                .search_similar(index_id, query, limit, filters)
                .await?;
            merged.extend(results);
        }
        merged.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        merged.truncate(limit);
        Ok(merged)
    }
}
