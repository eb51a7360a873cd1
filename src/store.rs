//! SQLite-backed vector store.
//!
//! One store holds many indexes; each index pairs a document with one
//! (provider, model, dimensions, chunking) configuration. Chunk text and
//! packed vectors live in separate tables joined by chunk id.
//!
//! Similarity search has two backends behind one interface. When the
//! sqlite-vec extension is present, `vec_distance_cosine` ranks inside
//! SQLite. Otherwise vectors are decoded and ranked in Rust. Both paths
//! apply identical filters and produce identical ranking, ties broken by
//! ascending chunk id.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{Error, Result};
use crate::models::{
    Chunk, ChunkMetadata, DocumentInfo, IndexConfig, IndexRecord, IndexStatistics, IndexingState,
    IndexingStatus, SearchResult,
};
use crate::vector::{blob_to_vec, cosine_similarity, vec_to_blob};

/// How similarity ranking is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    /// sqlite-vec's `vec_distance_cosine` ranks inside the database.
    Accelerated,
    /// Vectors are decoded and ranked in Rust.
    LinearScan,
}

/// Metadata filters applied before ranking. All populated fields must
/// match (AND); within `any_tags`, one matching tag suffices (OR).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub include_documents: Vec<i64>,
    pub exclude_documents: Vec<i64>,
    pub author_contains: Option<String>,
    pub any_tags: Vec<String>,
}

pub struct VectorStore {
    pool: SqlitePool,
    backend: SearchBackend,
}

impl VectorStore {
    /// Wrap a pool, probing once for the sqlite-vec extension.
    pub async fn new(pool: SqlitePool) -> Self {
        let backend = match sqlx::query_scalar::<_, String>("SELECT vec_version()")
            .fetch_one(&pool)
            .await
        {
            Ok(version) => {
                tracing::info!(version = %version, "sqlite-vec detected, using accelerated search");
                SearchBackend::Accelerated
            }
            Err(_) => {
                tracing::info!("sqlite-vec not available, using linear-scan search");
                SearchBackend::LinearScan
            }
        };
        Self { pool, backend }
    }

    pub fn backend(&self) -> SearchBackend {
        self.backend
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Mirror host-owned document metadata, replacing any previous row.
    pub async fn upsert_document(&self, info: &DocumentInfo) -> Result<()> {
        let authors = serde_json::to_string(&info.authors).unwrap_or_else(|_| "[]".to_string());
        let tags = serde_json::to_string(&info.tags).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            r#"
            INSERT INTO documents (document_id, title, authors, tags, language, last_indexed)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                title = excluded.title,
                authors = excluded.authors,
                tags = excluded.tags,
                language = excluded.language,
                last_indexed = excluded.last_indexed
            "#,
        )
        .bind(info.document_id)
        .bind(&info.title)
        .bind(authors)
        .bind(tags)
        .bind(&info.language)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create an index row. A duplicate six-field configuration is a
    /// [`Error::Conflict`]; callers that want idempotent behavior use
    /// [`find_index`](Self::find_index) first.
    pub async fn create_index(&self, config: &IndexConfig) -> Result<IndexRecord> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO indexes
                (document_id, provider, model_name, dimensions, chunk_size, chunk_overlap,
                 total_chunks, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(config.document_id)
        .bind(&config.provider)
        .bind(&config.model_name)
        .bind(config.dimensions as i64)
        .bind(config.chunk_size as i64)
        .bind(config.chunk_overlap as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) => {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return Err(Error::Conflict(format!(
                            "index already exists for document {} with provider '{}', model '{}', \
                             {} dims, chunk_size {}, overlap {}",
                            config.document_id,
                            config.provider,
                            config.model_name,
                            config.dimensions,
                            config.chunk_size,
                            config.chunk_overlap,
                        )));
                    }
                }
                return Err(e.into());
            }
        };

        Ok(IndexRecord {
            index_id: result.last_insert_rowid(),
            document_id: config.document_id,
            provider: config.provider.clone(),
            model_name: config.model_name.clone(),
            dimensions: config.dimensions,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            total_chunks: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up the index matching an exact six-field configuration.
    pub async fn find_index(&self, config: &IndexConfig) -> Result<Option<IndexRecord>> {
        let row = sqlx::query(
            r#"
            SELECT index_id, document_id, provider, model_name, dimensions,
                   chunk_size, chunk_overlap, total_chunks, created_at, updated_at
            FROM indexes
            WHERE document_id = ? AND provider = ? AND model_name = ?
              AND dimensions = ? AND chunk_size = ? AND chunk_overlap = ?
            "#,
        )
        .bind(config.document_id)
        .bind(&config.provider)
        .bind(&config.model_name)
        .bind(config.dimensions as i64)
        .bind(config.chunk_size as i64)
        .bind(config.chunk_overlap as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| index_from_row(&r)))
    }

    pub async fn get_index(&self, index_id: i64) -> Result<Option<IndexRecord>> {
        let row = sqlx::query(
            r#"
            SELECT index_id, document_id, provider, model_name, dimensions,
                   chunk_size, chunk_overlap, total_chunks, created_at, updated_at
            FROM indexes WHERE index_id = ?
            "#,
        )
        .bind(index_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| index_from_row(&r)))
    }

    pub async fn indexes_for_document(&self, document_id: i64) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT index_id, document_id, provider, model_name, dimensions,
                   chunk_size, chunk_overlap, total_chunks, created_at, updated_at
            FROM indexes WHERE document_id = ? ORDER BY index_id
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(index_from_row).collect())
    }

    pub async fn indexes_by_provider(&self, provider: &str) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT index_id, document_id, provider, model_name, dimensions,
                   chunk_size, chunk_overlap, total_chunks, created_at, updated_at
            FROM indexes WHERE provider = ? ORDER BY index_id
            "#,
        )
        .bind(provider)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(index_from_row).collect())
    }

    pub async fn all_indexes(&self) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT index_id, document_id, provider, model_name, dimensions,
                   chunk_size, chunk_overlap, total_chunks, created_at, updated_at
            FROM indexes ORDER BY index_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(index_from_row).collect())
    }

    /// Delete one index with its chunks and vectors. Returns whether an
    /// index row existed. Deletes are explicit rather than relying on
    /// foreign-key cascade so the store behaves the same when the pool was
    /// opened without `foreign_keys`.
    pub async fn delete_index(&self, index_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM embeddings WHERE index_id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE index_id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM indexes WHERE index_id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a document mirror row and every index built from it.
    pub async fn delete_document(&self, document_id: i64) -> Result<bool> {
        let indexes = self.indexes_for_document(document_id).await?;
        for index in &indexes {
            self.delete_index(index.index_id).await?;
        }
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM indexing_status WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM documents WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0 || !indexes.is_empty())
    }

    /// Remove an index's chunks and vectors, keeping the index row.
    pub async fn clear_index(&self, index_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM embeddings WHERE index_id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE index_id = ?")
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE indexes SET total_chunks = 0, updated_at = ? WHERE index_id = ?")
            .bind(Utc::now().timestamp())
            .bind(index_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist a batch of chunks with their vectors in one transaction.
    ///
    /// Every vector must match the index's declared dimensionality; a
    /// mismatch rejects the whole batch before anything is written.
    pub async fn insert_chunks(
        &self,
        index_id: i64,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<i64>> {
        if chunks.len() != vectors.len() {
            return Err(Error::Validation(format!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let index = self
            .get_index(index_id)
            .await?
            .ok_or_else(|| Error::Validation(format!("unknown index id: {index_id}")))?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            if vector.len() != index.dimensions {
                return Err(Error::Validation(format!(
                    "vector for chunk {} has {} dimensions, index {} requires {}",
                    chunk.position,
                    vector.len(),
                    index_id,
                    index.dimensions
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        let mut chunk_ids = Vec::with_capacity(chunks.len());

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let metadata =
                serde_json::to_string(&chunk.metadata).unwrap_or_else(|_| "{}".to_string());
            let result = sqlx::query(
                r#"
                INSERT INTO chunks
                    (document_id, index_id, chunk_position, text, start_offset, end_offset, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(index.document_id)
            .bind(index_id)
            .bind(chunk.position as i64)
            .bind(&chunk.text)
            .bind(chunk.start_offset as i64)
            .bind(chunk.end_offset as i64)
            .bind(metadata)
            .execute(&mut *tx)
            .await?;

            let chunk_id = result.last_insert_rowid();
            sqlx::query("INSERT INTO embeddings (chunk_id, index_id, vector) VALUES (?, ?, ?)")
                .bind(chunk_id)
                .bind(index_id)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
            chunk_ids.push(chunk_id);
        }

        tx.commit().await?;
        Ok(chunk_ids)
    }

    pub async fn update_index_total(&self, index_id: i64, total_chunks: i64) -> Result<()> {
        sqlx::query("UPDATE indexes SET total_chunks = ?, updated_at = ? WHERE index_id = ?")
            .bind(total_chunks)
            .bind(Utc::now().timestamp())
            .bind(index_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite a document's indexing status row.
    pub async fn set_status(
        &self,
        document_id: i64,
        state: IndexingState,
        progress: f64,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        let completed_at = matches!(state, IndexingState::Completed | IndexingState::Error)
            .then_some(now);
        sqlx::query(
            r#"
            INSERT INTO indexing_status
                (document_id, status, progress, error_message, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                error_message = excluded.error_message,
                started_at = CASE WHEN excluded.status = 'indexing'
                                  THEN excluded.started_at
                                  ELSE indexing_status.started_at END,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(document_id)
        .bind(state.as_str())
        .bind(progress)
        .bind(error_message)
        .bind(now)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_status(&self, document_id: i64) -> Result<Option<IndexingStatus>> {
        let row = sqlx::query(
            r#"
            SELECT document_id, status, progress, error_message, started_at, completed_at
            FROM indexing_status WHERE document_id = ?
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(status_from_row))
    }

    pub async fn all_statuses(&self) -> Result<Vec<IndexingStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT document_id, status, progress, error_message, started_at, completed_at
            FROM indexing_status ORDER BY document_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(status_from_row).collect())
    }

    /// Chunk count and approximate storage footprint for one index.
    pub async fn index_statistics(&self, index_id: i64) -> Result<IndexStatistics> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS chunk_count,
                   COALESCE(SUM(LENGTH(c.text)), 0) + COALESCE(
                       (SELECT SUM(LENGTH(e.vector)) FROM embeddings e WHERE e.index_id = ?), 0
                   ) AS storage_bytes
            FROM chunks c WHERE c.index_id = ?
            "#,
        )
        .bind(index_id)
        .bind(index_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(IndexStatistics {
            chunk_count: row.get("chunk_count"),
            storage_bytes: row.get("storage_bytes"),
        })
    }

    pub async fn count_indexed_documents(&self) -> Result<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(DISTINCT document_id) FROM indexes WHERE total_chunks > 0",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Rank an index's chunks by cosine similarity to the query vector.
    pub async fn search_similar(
        &self,
        index_id: i64,
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let index = self
            .get_index(index_id)
            .await?
            .ok_or_else(|| Error::Validation(format!("unknown index id: {index_id}")))?;
        if query.len() != index.dimensions {
            return Err(Error::Validation(format!(
                "query vector has {} dimensions, index {} requires {}",
                query.len(),
                index_id,
                index.dimensions
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        // A zero-norm query has no direction; every similarity is exactly
        // 0 by the cosine convention. Route through the linear path so
        // both backends agree instead of handing the extension a
        // degenerate vector.
        let norm = query.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm < f32::EPSILON {
            return self.search_linear(index_id, query, limit, filters).await;
        }

        match self.backend {
            SearchBackend::Accelerated => {
                self.search_accelerated(index_id, query, limit, filters).await
            }
            SearchBackend::LinearScan => {
                self.search_linear(index_id, query, limit, filters).await
            }
        }
    }

    async fn search_accelerated(
        &self,
        index_id: i64,
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT c.chunk_id, c.document_id, c.index_id, c.chunk_position, c.text, c.metadata,
                   vec_distance_cosine(e.vector, "#,
        );
        builder.push_bind(vec_to_blob(query));
        builder.push(
            r#") AS distance
            FROM embeddings e
            JOIN chunks c ON c.chunk_id = e.chunk_id
            JOIN documents d ON d.document_id = c.document_id
            WHERE e.index_id = "#,
        );
        builder.push_bind(index_id);
        push_filters(&mut builder, filters);
        builder.push(" ORDER BY distance ASC, c.chunk_id ASC LIMIT ");
        builder.push_bind(limit as i64);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let distance: f64 = row.get("distance");
                result_from_row(row, 1.0 - distance as f32)
            })
            .collect())
    }

    async fn search_linear(
        &self,
        index_id: i64,
        query: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT c.chunk_id, c.document_id, c.index_id, c.chunk_position, c.text, c.metadata,
                   e.vector
            FROM embeddings e
            JOIN chunks c ON c.chunk_id = e.chunk_id
            JOIN documents d ON d.document_id = c.document_id
            WHERE e.index_id = "#,
        );
        builder.push_bind(index_id);
        push_filters(&mut builder, filters);

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut scored: Vec<SearchResult> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let vector = blob_to_vec(&blob);
                result_from_row(row, cosine_similarity(query, &vector))
            })
            .collect();

        // Same ranking as the accelerated path: best similarity first,
        // ties broken by ascending chunk id.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Append filter clauses shared by both search backends.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &SearchFilters) {
    if !filters.include_documents.is_empty() {
        builder.push(" AND c.document_id IN (");
        let mut separated = builder.separated(", ");
        for id in &filters.include_documents {
            separated.push_bind(*id);
        }
        builder.push(")");
    }
    if !filters.exclude_documents.is_empty() {
        builder.push(" AND c.document_id NOT IN (");
        let mut separated = builder.separated(", ");
        for id in &filters.exclude_documents {
            separated.push_bind(*id);
        }
        builder.push(")");
    }
    if let Some(author) = &filters.author_contains {
        builder.push(" AND d.authors LIKE ");
        builder.push_bind(format!("%{author}%"));
    }
    if !filters.any_tags.is_empty() {
        builder.push(" AND (");
        for (i, tag) in filters.any_tags.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push("d.tags LIKE ");
            // Tags are stored as a JSON array, so a quoted match is exact
            // per element.
            builder.push_bind(format!("%\"{tag}\"%"));
        }
        builder.push(")");
    }
}

fn index_from_row(row: &SqliteRow) -> IndexRecord {
    IndexRecord {
        index_id: row.get("index_id"),
        document_id: row.get("document_id"),
        provider: row.get("provider"),
        model_name: row.get("model_name"),
        dimensions: row.get::<i64, _>("dimensions") as usize,
        chunk_size: row.get::<i64, _>("chunk_size") as usize,
        chunk_overlap: row.get::<i64, _>("chunk_overlap") as usize,
        total_chunks: row.get("total_chunks"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn status_from_row(row: &SqliteRow) -> IndexingStatus {
    let status: String = row.get("status");
    IndexingStatus {
        document_id: row.get("document_id"),
        state: IndexingState::parse(&status).unwrap_or(IndexingState::Pending),
        progress: row.get("progress"),
        error_message: row.get("error_message"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    }
}

fn result_from_row(row: &SqliteRow, similarity: f32) -> SearchResult {
    let metadata: String = row.get("metadata");
    SearchResult {
        chunk_id: row.get("chunk_id"),
        document_id: row.get("document_id"),
        index_id: row.get("index_id"),
        position: row.get("chunk_position"),
        text: row.get("text"),
        similarity,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::run_migrations;

    async fn store() -> VectorStore {
        let pool = db::connect_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        VectorStore::new(pool).await
    }

    fn doc(id: i64) -> DocumentInfo {
        DocumentInfo {
            document_id: id,
            title: Some(format!("doc {id}")),
            authors: vec!["Kant".to_string()],
            tags: vec!["philosophy".to_string()],
            language: Some("en".to_string()),
        }
    }

    fn index_config(document_id: i64) -> IndexConfig {
        IndexConfig {
            document_id,
            provider: "mock".to_string(),
            model_name: "deterministic".to_string(),
            dimensions: 3,
            chunk_size: 300,
            chunk_overlap: 50,
        }
    }

    fn chunk(position: usize, text: &str) -> Chunk {
        Chunk {
            position,
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.len(),
            metadata: ChunkMetadata::default(),
        }
    }

    #[tokio::test]
    async fn create_index_rejects_duplicate_configuration() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        store.create_index(&index_config(1)).await.unwrap();

        let err = store.create_index(&index_config(1)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // A different chunk size is a different index.
        let mut other = index_config(1);
        other.chunk_size = 100;
        store.create_index(&other).await.unwrap();
    }

    #[tokio::test]
    async fn find_index_matches_exact_configuration() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let created = store.create_index(&index_config(1)).await.unwrap();

        let found = store.find_index(&index_config(1)).await.unwrap().unwrap();
        assert_eq!(found.index_id, created.index_id);

        let mut other = index_config(1);
        other.provider = "openai".to_string();
        assert!(store.find_index(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_chunks_enforces_dimensions() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();

        let err = store
            .insert_chunks(index.index_id, &[chunk(0, "hello")], &[vec![1.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Nothing was written.
        assert_eq!(store.count_chunks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn linear_search_ranks_by_similarity_with_chunk_id_tiebreak() {
        let store = store().await;
        assert_eq!(store.backend(), SearchBackend::LinearScan);
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();

        let chunks = vec![chunk(0, "exact"), chunk(1, "orthogonal"), chunk(2, "also exact")];
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
        ];
        let ids = store
            .insert_chunks(index.index_id, &chunks, &vectors)
            .await
            .unwrap();

        let results = store
            .search_similar(index.index_id, &[1.0, 0.0, 0.0], 10, &SearchFilters::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        // Tied top scores come back in chunk id order.
        assert_eq!(results[0].chunk_id, ids[0]);
        assert_eq!(results[1].chunk_id, ids[2]);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert!(results[2].similarity < 0.5);
    }

    #[tokio::test]
    async fn zero_norm_query_scores_everything_zero_in_chunk_id_order() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        let vectors = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let ids = store
            .insert_chunks(index.index_id, &chunks, &vectors)
            .await
            .unwrap();

        let results = store
            .search_similar(index.index_id, &[0.0, 0.0, 0.0], 10, &SearchFilters::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.similarity, 0.0);
        }
        assert_eq!(results[0].chunk_id, ids[0]);
        assert_eq!(results[1].chunk_id, ids[1]);
    }

    #[tokio::test]
    async fn search_rejects_query_dimension_mismatch() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();

        let err = store
            .search_similar(index.index_id, &[1.0, 0.0], 10, &SearchFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn filters_restrict_results() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        store
            .upsert_document(&DocumentInfo {
                document_id: 2,
                title: Some("other".to_string()),
                authors: vec!["Hume".to_string()],
                tags: vec!["empiricism".to_string()],
                language: Some("en".to_string()),
            })
            .await
            .unwrap();

        let index1 = store.create_index(&index_config(1)).await.unwrap();
        let index2 = store.create_index(&index_config(2)).await.unwrap();
        store
            .insert_chunks(index1.index_id, &[chunk(0, "a")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();
        store
            .insert_chunks(index2.index_id, &[chunk(0, "b")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();

        let query = [1.0, 0.0, 0.0];

        let only_kant = SearchFilters {
            author_contains: Some("Kant".to_string()),
            ..Default::default()
        };
        let results = store
            .search_similar(index2.index_id, &query, 10, &only_kant)
            .await
            .unwrap();
        assert!(results.is_empty());

        let tagged = SearchFilters {
            any_tags: vec!["empiricism".to_string()],
            ..Default::default()
        };
        let results = store
            .search_similar(index2.index_id, &query, 10, &tagged)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let excluded = SearchFilters {
            exclude_documents: vec![2],
            ..Default::default()
        };
        let results = store
            .search_similar(index2.index_id, &query, 10, &excluded)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn delete_index_removes_chunks_and_vectors() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();
        store
            .insert_chunks(index.index_id, &[chunk(0, "a")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();

        assert!(store.delete_index(index.index_id).await.unwrap());
        assert!(!store.delete_index(index.index_id).await.unwrap());
        assert_eq!(store.count_chunks().await.unwrap(), 0);
        assert!(store.get_index(index.index_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_document_removes_every_index() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();
        let mut other = index_config(1);
        other.provider = "openai".to_string();
        store.create_index(&other).await.unwrap();
        store
            .insert_chunks(index.index_id, &[chunk(0, "a")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();
        store
            .set_status(1, IndexingState::Completed, 1.0, None)
            .await
            .unwrap();

        assert!(store.delete_document(1).await.unwrap());
        assert!(store.indexes_for_document(1).await.unwrap().is_empty());
        assert_eq!(store.count_chunks().await.unwrap(), 0);
        assert!(store.get_status(1).await.unwrap().is_none());
        assert!(!store.delete_document(1).await.unwrap());
    }

    #[tokio::test]
    async fn clear_index_keeps_the_index_row() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();
        store
            .insert_chunks(index.index_id, &[chunk(0, "a")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();
        store.update_index_total(index.index_id, 1).await.unwrap();

        store.clear_index(index.index_id).await.unwrap();
        assert_eq!(store.count_chunks().await.unwrap(), 0);
        let kept = store.get_index(index.index_id).await.unwrap().unwrap();
        assert_eq!(kept.total_chunks, 0);
    }

    #[tokio::test]
    async fn status_rows_are_overwritten_per_document() {
        let store = store().await;
        store
            .set_status(1, IndexingState::Indexing, 0.1, None)
            .await
            .unwrap();
        store
            .set_status(1, IndexingState::Completed, 1.0, None)
            .await
            .unwrap();

        let status = store.get_status(1).await.unwrap().unwrap();
        assert_eq!(status.state, IndexingState::Completed);
        assert!((status.progress - 1.0).abs() < f64::EPSILON);
        assert!(status.completed_at.is_some());
        assert_eq!(store.all_statuses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn statistics_count_text_and_vector_bytes() {
        let store = store().await;
        store.upsert_document(&doc(1)).await.unwrap();
        let index = store.create_index(&index_config(1)).await.unwrap();
        store
            .insert_chunks(index.index_id, &[chunk(0, "abcde")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();

        let stats = store.index_statistics(index.index_id).await.unwrap();
        assert_eq!(stats.chunk_count, 1);
        // 5 text bytes + 12 vector bytes
        assert_eq!(stats.storage_bytes, 17);
    }
}
