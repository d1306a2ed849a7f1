//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Each index is one collection inside a shared `chunks` table. Vectors are
//! stored as little-endian `f32` BLOBs and searched by brute-force cosine
//! similarity, which is ample for a single user's uploaded documents.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ragchat_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use ragchat_core::models::{ChunkMetadata, DocumentChunk};
use ragchat_core::store::{ensure_aligned, IndexedChunk, SimilarityHit, VectorIndex};

use crate::{db, migrate};

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    /// Connect to the database at `path`, run migrations, and bind to
    /// `collection`.
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        let pool = db::connect(path)
            .await
            .with_context(|| format!("Failed to open vector store at {}", path.display()))?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, collection))
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn load_rows(&self) -> Result<Vec<IndexedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, metadata_json, embedding
            FROM chunks
            WHERE collection = ?
            ORDER BY seq
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let metadata_json: String = row.get("metadata_json");
                let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                    .with_context(|| format!("Corrupt metadata for chunk {}", id))?;
                let blob: Vec<u8> = row.get("embedding");
                Ok(IndexedChunk {
                    chunk: DocumentChunk {
                        id,
                        content: row.get("content"),
                        metadata,
                    },
                    vector: blob_to_vec(&blob),
                })
            })
            .collect()
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        ensure_aligned(chunks, vectors)?;
        if chunks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (collection, id, content, metadata_json, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(&self.collection)
            .bind(&chunk.id)
            .bind(&chunk.content)
            .bind(&metadata_json)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SimilarityHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SimilarityHit> = self
            .load_rows()
            .await?
            .into_iter()
            .map(|entry| SimilarityHit {
                score: cosine_similarity(vector, &entry.vector),
                chunk: entry.chunk,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM chunks WHERE collection = ? AND id = ?")
                .bind(&self.collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM chunks WHERE collection = ? ORDER BY seq")
                .bind(&self.collection)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn fetch_all(&self) -> Result<Vec<IndexedChunk>> {
        self.load_rows().await
    }
}
