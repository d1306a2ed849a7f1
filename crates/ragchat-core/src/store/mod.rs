//! Similarity-search abstraction for ragchat.
//!
//! The [`VectorIndex`] trait is the boundary between the document store and
//! whatever engine actually holds vectors: one named collection of
//! [`DocumentChunk`]s plus their embeddings. Backends are pluggable
//! (SQLite in the app crate, in-memory here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentChunk;

/// A chunk together with the vector it was committed with.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

/// One ranked result of a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub chunk: DocumentChunk,
    /// Cosine similarity in `[-1.0, 1.0]`; higher is closer.
    pub score: f32,
}

/// A named collection of embedded chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Commit chunks with their vectors (all or nothing) |
/// | [`query`](VectorIndex::query) | Top-`k` chunks by descending cosine similarity |
/// | [`delete`](VectorIndex::delete) | Remove chunks by ID; unknown IDs are ignored |
/// | [`list_ids`](VectorIndex::list_ids) | IDs of every committed chunk |
/// | [`fetch_all`](VectorIndex::fetch_all) | Every chunk and vector, in insertion order |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Collection name (e.g. `"LocalRAG"`).
    fn collection(&self) -> &str;

    /// Commit `chunks[i]` with `vectors[i]`. Re-adding an existing ID
    /// replaces it. Either every chunk becomes queryable or none does.
    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return at most `k` hits ordered by descending similarity. Ties keep
    /// insertion order.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SimilarityHit>>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    async fn list_ids(&self) -> Result<Vec<String>>;

    async fn fetch_all(&self) -> Result<Vec<IndexedChunk>>;
}

/// Check the `add` preconditions shared by every backend.
pub fn ensure_aligned(chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        anyhow::bail!(
            "chunk/vector count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        );
    }
    if let Some(first) = vectors.first() {
        if first.is_empty() {
            anyhow::bail!("empty embedding vector");
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != first.len()) {
            anyhow::bail!(
                "inconsistent embedding dims: vector {} has {} dims, expected {}",
                bad,
                vectors[bad].len(),
                first.len()
            );
        }
    }
    Ok(())
}
