use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent — safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Denormalized mirror of host-owned document metadata
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            document_id INTEGER PRIMARY KEY,
            title TEXT,
            authors TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            language TEXT,
            last_indexed INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One index per (document, provider, model, dims, chunking) configuration
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexes (
            index_id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL,
            provider TEXT NOT NULL,
            model_name TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            chunk_size INTEGER NOT NULL,
            chunk_overlap INTEGER NOT NULL,
            total_chunks INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            UNIQUE(document_id, provider, model_name, dimensions, chunk_size, chunk_overlap),
            FOREIGN KEY (document_id) REFERENCES documents(document_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            chunk_id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id INTEGER NOT NULL,
            index_id INTEGER NOT NULL,
            chunk_position INTEGER NOT NULL,
            text TEXT NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            UNIQUE(index_id, chunk_position),
            FOREIGN KEY (index_id) REFERENCES indexes(index_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Packed little-endian f32 vectors, one per chunk
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            chunk_id INTEGER PRIMARY KEY,
            index_id INTEGER NOT NULL,
            vector BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexing_status (
            document_id INTEGER PRIMARY KEY,
            status TEXT NOT NULL,
            progress REAL NOT NULL DEFAULT 0.0,
            error_message TEXT,
            started_at INTEGER,
            completed_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_indexes_document_id ON indexes(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_index_id ON chunks(index_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_index_id ON embeddings(index_id)")
        .execute(pool)
        .await?;

    Ok(())
}
