//! Batch indexing orchestration.
//!
//! The pipeline drives one document at a time through metadata fetch, text
//! extraction, chunking, batched embedding, and persistence, reporting
//! progress through registered callbacks and a per-document status row.
//! A failure in one document is recorded and never aborts the rest of the
//! batch. Cancellation is cooperative: the flag is checked between
//! documents and between embedding batches, never mid-request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::chunker::TextChunker;
use crate::config::{ChunkingConfig, PipelineConfig};
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use crate::library::DocumentLibrary;
use crate::models::{
    ChunkMetadata, IndexConfig, IndexingState, IndexingStatus, LibraryStatistics,
};
use crate::repository::IndexRepository;

pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// One progress observation, emitted to every registered callback.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// 1-based position of this document within the batch.
    pub current: usize,
    /// Number of documents in the batch.
    pub total: usize,
    pub document_id: i64,
    pub state: IndexingState,
    /// Per-document progress fraction in [0, 1].
    pub progress: f64,
    /// Chunks persisted for this document so far.
    pub chunk_count: usize,
    pub error: Option<String>,
}

/// One document's recorded failure.
#[derive(Debug, Clone)]
pub struct DocumentError {
    pub document_id: i64,
    pub error: String,
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct IndexingReport {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_chunks: usize,
    pub elapsed: Duration,
    pub errors: Vec<DocumentError>,
    pub cancelled: bool,
}

pub struct IndexingPipeline {
    library: Arc<dyn DocumentLibrary>,
    embeddings: EmbeddingService,
    repository: IndexRepository,
    chunker: Box<dyn TextChunker>,
    chunking: ChunkingConfig,
    embed_batch_size: usize,
    cancel: AtomicBool,
    callbacks: Mutex<Vec<(u64, ProgressCallback)>>,
    next_callback_id: AtomicU64,
}

impl IndexingPipeline {
    pub fn new(
        library: Arc<dyn DocumentLibrary>,
        embeddings: EmbeddingService,
        repository: IndexRepository,
        chunker: Box<dyn TextChunker>,
        chunking: ChunkingConfig,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            library,
            embeddings,
            repository,
            chunker,
            chunking,
            embed_batch_size: pipeline.embed_batch_size.max(1),
            cancel: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
            next_callback_id: AtomicU64::new(1),
        }
    }

    /// Register a progress observer. The returned id unregisters it.
    pub fn register_progress_callback(&self, callback: ProgressCallback) -> u64 {
        let id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .expect("lock poisoned")
            .push((id, callback));
        id
    }

    pub fn unregister_progress_callback(&self, id: u64) {
        self.callbacks
            .lock()
            .expect("lock poisoned")
            .retain(|(cb_id, _)| *cb_id != id);
    }

    /// Request cooperative cancellation of the running batch.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn emit(&self, event: &ProgressEvent) {
        let callbacks = self.callbacks.lock().expect("lock poisoned");
        for (_, callback) in callbacks.iter() {
            callback(event);
        }
    }

    /// The index configuration every document in this pipeline is stored
    /// under, derived from the preferred provider and chunking settings.
    fn index_config(&self, document_id: i64) -> IndexConfig {
        let identity = self.embeddings.identity();
        let (provider, model_name) = identity
            .split_once(':')
            .map(|(p, m)| (p.to_string(), m.to_string()))
            .unwrap_or_else(|| (identity.clone(), String::new()));
        IndexConfig {
            document_id,
            provider,
            model_name,
            dimensions: self.embeddings.dimensions(),
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
        }
    }

    /// Index a batch of documents, isolating per-document failures.
    pub async fn index_documents(&self, document_ids: &[i64], reindex: bool) -> IndexingReport {
        let started = Instant::now();
        let mut report = IndexingReport::default();
        let total = document_ids.len();

        for (i, &document_id) in document_ids.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }

            let current = i + 1;

            if !reindex && self.has_content(document_id).await {
                tracing::debug!(document_id, "already indexed, skipping");
                // A skip is processed but not successful.
                report.processed += 1;
                report.skipped += 1;
                self.emit(&ProgressEvent {
                    current,
                    total,
                    document_id,
                    state: IndexingState::Completed,
                    progress: 1.0,
                    chunk_count: 0,
                    error: None,
                });
                continue;
            }

            report.processed += 1;
            match self.index_one(document_id, current, total).await {
                Ok(chunk_count) => {
                    report.successful += 1;
                    report.total_chunks += chunk_count;
                }
                Err(e) if e.is_cancelled() => {
                    let message = e.to_string();
                    let _ = self
                        .repository
                        .store()
                        .set_status(document_id, IndexingState::Error, 0.0, Some(&message))
                        .await;
                    report.failed += 1;
                    report.errors.push(DocumentError {
                        document_id,
                        error: message,
                    });
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(document_id, error = %message, "indexing failed");
                    let _ = self
                        .repository
                        .store()
                        .set_status(document_id, IndexingState::Error, 0.0, Some(&message))
                        .await;
                    self.emit(&ProgressEvent {
                        current,
                        total,
                        document_id,
                        state: IndexingState::Error,
                        progress: 0.0,
                        chunk_count: 0,
                        error: Some(message.clone()),
                    });
                    report.failed += 1;
                    report.errors.push(DocumentError {
                        document_id,
                        error: message,
                    });
                }
            }
        }

        // The flag is consumed by the run it stopped; a cancellation
        // requested before a run still cancels that run at the first check.
        self.cancel.store(false, Ordering::Relaxed);

        report.elapsed = started.elapsed();
        report
    }

    async fn has_content(&self, document_id: i64) -> bool {
        match self.repository.store().find_index(&self.index_config(document_id)).await {
            Ok(Some(index)) => index.total_chunks > 0,
            _ => false,
        }
    }

    async fn index_one(&self, document_id: i64, current: usize, total: usize) -> Result<usize> {
        let store = self.repository.store();

        store
            .set_status(document_id, IndexingState::Indexing, 0.0, None)
            .await?;
        self.emit(&ProgressEvent {
            current,
            total,
            document_id,
            state: IndexingState::Indexing,
            progress: 0.0,
            chunk_count: 0,
            error: None,
        });

        let info = self
            .library
            .get_document_metadata(document_id)
            .await
            .map_err(|e| Error::Validation(format!("metadata unavailable: {e}")))?;
        let text = self
            .library
            .get_document_text(document_id, None)
            .await
            .map_err(|e| Error::Validation(format!("text unavailable: {e}")))?;
        if text.trim().is_empty() {
            return Err(Error::Validation(format!(
                "document {document_id} has no extractable text"
            )));
        }

        store.upsert_document(&info).await?;
        store
            .set_status(document_id, IndexingState::Indexing, 0.1, None)
            .await?;

        let metadata = ChunkMetadata {
            title: info.title.clone(),
            authors: info.authors.clone(),
            tags: info.tags.clone(),
            language: info.language.clone(),
            ..Default::default()
        };
        let chunks = self.chunker.chunk(&text, &metadata);
        if chunks.is_empty() {
            return Err(Error::Validation(format!(
                "document {document_id} produced no chunks"
            )));
        }

        store
            .set_status(document_id, IndexingState::Indexing, 0.2, None)
            .await?;

        let index = self.repository.ensure_index(&self.index_config(document_id)).await?;
        store.clear_index(index.index_id).await?;

        let total_chunks = chunks.len();
        let mut persisted = 0usize;

        for batch in chunks.chunks(self.embed_batch_size) {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embeddings.generate_batch(&texts).await?;
            store.insert_chunks(index.index_id, batch, &vectors).await?;
            persisted += batch.len();

            let progress = 0.2 + 0.8 * (persisted as f64 / total_chunks as f64);
            store
                .set_status(document_id, IndexingState::Indexing, progress, None)
                .await?;
            self.emit(&ProgressEvent {
                current,
                total,
                document_id,
                state: IndexingState::Indexing,
                progress,
                chunk_count: persisted,
                error: None,
            });
        }

        store.update_index_total(index.index_id, persisted as i64).await?;
        store
            .set_status(document_id, IndexingState::Completed, 1.0, None)
            .await?;
        self.emit(&ProgressEvent {
            current,
            total,
            document_id,
            state: IndexingState::Completed,
            progress: 1.0,
            chunk_count: persisted,
            error: None,
        });

        Ok(persisted)
    }

    pub async fn get_indexing_status(&self, document_id: i64) -> Result<Option<IndexingStatus>> {
        self.repository.store().get_status(document_id).await
    }

    /// Library-wide indexing coverage, combining host document counts with
    /// store-side chunk counts.
    pub async fn get_library_statistics(&self) -> Result<LibraryStatistics> {
        let total_documents = self
            .library
            .list_document_ids()
            .await
            .map_err(|e| Error::Validation(format!("library unavailable: {e}")))?
            .len() as i64;
        let indexed_documents = self.repository.store().count_indexed_documents().await?;
        let total_chunks = self.repository.store().count_chunks().await?;
        let coverage_percent = if total_documents > 0 {
            100.0 * indexed_documents as f64 / total_documents as f64
        } else {
            0.0
        };
        Ok(LibraryStatistics {
            total_documents,
            indexed_documents,
            total_chunks,
            coverage_percent,
        })
    }
}
