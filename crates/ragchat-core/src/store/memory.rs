//! In-memory [`VectorIndex`] implementation for testing and embedding in
//! short-lived processes.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Similarity search is
//! brute-force cosine similarity over all stored vectors.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::DocumentChunk;

use super::{ensure_aligned, IndexedChunk, SimilarityHit, VectorIndex};

/// In-memory collection of embedded chunks.
pub struct InMemoryIndex {
    collection: String,
    entries: RwLock<Vec<IndexedChunk>>,
}

impl InMemoryIndex {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<IndexedChunk>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<IndexedChunk>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        ensure_aligned(chunks, vectors)?;
        let mut entries = self.write();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let entry = IndexedChunk {
                chunk: chunk.clone(),
                vector: vector.clone(),
            };
            match entries.iter_mut().find(|e| e.chunk.id == chunk.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SimilarityHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let entries = self.read();
        let mut hits: Vec<SimilarityHit> = entries
            .iter()
            .map(|e| SimilarityHit {
                chunk: e.chunk.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.write().retain(|e| !ids.contains(&e.chunk.id));
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.read().iter().map(|e| e.chunk.id.clone()).collect())
    }

    async fn fetch_all(&self) -> Result<Vec<IndexedChunk>> {
        Ok(self.read().clone())
    }
}
