//! SQLite-backed vector index.
//!
//! A single table holds one row per memory:
//! - `document` is the raw text
//! - `metadata` is the flat metadata as a JSON object of scalars
//! - `embedding` is the vector as little-endian f32 bytes
//!
//! Queries scan every row and rank by cosine distance in Rust.

use crate::vector;
use async_trait::async_trait;
use chrono::Utc;
use memir_core::error::MemoryError;
use memir_core::memory::{FlatMetadata, IndexEntry, IndexHit, MetadataFilter, VectorIndex};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A persistent vector index stored in one SQLite file.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (or create) the index at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let in_memory = path.contains(":memory:");
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Index(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" is its own database, so pin to one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Index(format!("Failed to open SQLite: {e}")))?;

        let index = Self { pool };
        index.run_migrations().await?;
        info!("SQLite vector index initialized at {path}");
        Ok(index)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_index (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT UNIQUE NOT NULL,
                document   TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                embedding  BLOB NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Index(format!("memory_index table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<IndexEntry, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::Index(format!("id column: {e}")))?;
        let document: String = row
            .try_get("document")
            .map_err(|e| MemoryError::Index(format!("document column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| MemoryError::Index(format!("metadata column: {e}")))?;
        let blob: Vec<u8> = row
            .try_get("embedding")
            .map_err(|e| MemoryError::Index(format!("embedding column: {e}")))?;

        let metadata: FlatMetadata = serde_json::from_str(&metadata_json).unwrap_or_else(|e| {
            warn!(id = %id, error = %e, "Unreadable metadata column, using empty metadata");
            FlatMetadata::new()
        });

        Ok(IndexEntry {
            id,
            document,
            embedding: blob_to_embedding(&blob),
            metadata,
        })
    }

    async fn fetch_all(&self) -> Result<Vec<IndexEntry>, MemoryError> {
        let rows = sqlx::query("SELECT id, document, metadata, embedding FROM memory_index ORDER BY iid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::Index(format!("Scan failed: {e}")))?;
        rows.iter().map(Self::row_to_entry).collect()
    }
}

/// Serialize an embedding vector to bytes.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<(), MemoryError> {
        let metadata_json = serde_json::to_string(&entry.metadata)
            .map_err(|e| MemoryError::Index(format!("Metadata serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO memory_index (id, document, metadata, embedding, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                metadata = excluded.metadata,
                embedding = excluded.embedding
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.document)
        .bind(&metadata_json)
        .bind(embedding_to_blob(&entry.embedding))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Index(format!("INSERT failed: {e}")))?;

        debug!("Indexed memory {}", entry.id);
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexHit>, MemoryError> {
        let entries = self.fetch_all().await?;
        Ok(vector::rank_nearest(entries.iter(), embedding, k, filter))
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>, MemoryError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query(
                "SELECT id, document, metadata, embedding FROM memory_index WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::Index(format!("GET by ID: {e}")))?;

            if let Some(ref r) = row {
                found.push(Self::row_to_entry(r)?);
            }
        }
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<IndexEntry>, MemoryError> {
        self.fetch_all().await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let mut deleted = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM memory_index WHERE id = ?1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::Index(format!("DELETE failed: {e}")))?;
            deleted += result.rows_affected();
        }
        Ok(deleted as usize)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM memory_index")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::Index(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| MemoryError::Index(format!("cnt column: {e}")))?;

        Ok(cnt as usize)
    }
}
