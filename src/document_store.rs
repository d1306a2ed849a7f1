//! Document store: ingestion, retrieval, archival and clearing of indexed
//! content.
//!
//! Wraps an active and an archive [`VectorIndex`] plus the
//! [`EmbeddingProvider`] that turns text into vectors. This is the only
//! path from raw chunks to queryable state: a chunk becomes visible to
//! [`DocumentStore::get_relevant_sources`] only once its embedding has been
//! computed and the whole batch has been committed.
//!
//! Store failures never escape as errors from the read paths.
//! [`has_documents`](DocumentStore::has_documents) degrades to `false`,
//! [`get_relevant_sources`](DocumentStore::get_relevant_sources) to an empty
//! list, and archive/clear report `false`.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use ragchat_core::embedding::EmbeddingProvider;
use ragchat_core::models::{DocumentChunk, RetrievedSource};
use ragchat_core::store::VectorIndex;

use crate::error::{ArchiveError, IngestionError, StoreAccessError};

pub struct DocumentStore {
    active: Arc<dyn VectorIndex>,
    archive: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl DocumentStore {
    pub fn new(
        active: Arc<dyn VectorIndex>,
        archive: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            active,
            archive,
            embedder,
        }
    }

    /// True iff the active collection holds at least one chunk.
    /// Returns `false` when the index cannot be reached.
    pub async fn has_documents(&self) -> bool {
        match self.active.list_ids().await {
            Ok(ids) => !ids.is_empty(),
            Err(e) => {
                warn!(
                    collection = self.active.collection(),
                    error = %e,
                    "could not list documents, treating store as empty"
                );
                false
            }
        }
    }

    /// Number of chunks in the active collection.
    pub async fn document_count(&self) -> Result<usize, StoreAccessError> {
        count_ids(self.active.as_ref()).await
    }

    /// Number of chunks in the archive collection.
    pub async fn archived_count(&self) -> Result<usize, StoreAccessError> {
        count_ids(self.archive.as_ref()).await
    }

    /// Embed `chunks` and commit them to the active collection.
    ///
    /// Either every chunk becomes queryable or none does: all embeddings
    /// are computed and checked before the single commit.
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<(), IngestionError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let vectors = self.embed_chunks(chunks).await?;

        self.active
            .add(chunks, &vectors)
            .await
            .map_err(|e| StoreAccessError::new("add", self.active.collection(), e))?;

        info!(
            collection = self.active.collection(),
            chunks = chunks.len(),
            "committed chunks"
        );
        Ok(())
    }

    async fn embed_chunks(&self, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>, IngestionError> {
        let batch_size = self.embedder.batch_size().max(1);
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let mut embedded = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| IngestionError::Embedding(format!("{:#}", e)))?;
            if embedded.len() != batch.len() {
                return Err(IngestionError::Embedding(format!(
                    "provider returned {} vectors for {} chunks",
                    embedded.len(),
                    batch.len()
                )));
            }
            debug!(batch = batch.len(), "embedded batch");
            vectors.append(&mut embedded);
        }

        let expected = match self.embedder.dims() {
            0 => vectors.first().map(Vec::len).unwrap_or(0),
            dims => dims,
        };
        if expected == 0 || vectors.iter().any(|v| v.len() != expected) {
            return Err(IngestionError::Embedding(format!(
                "inconsistent embedding dimensions (expected {})",
                expected
            )));
        }

        Ok(vectors)
    }

    /// At most `k` chunks ranked by descending similarity to `query`.
    /// Returns `[]` on an empty store or any failure.
    pub async fn get_relevant_sources(&self, query: &str, k: usize) -> Vec<RetrievedSource> {
        match self.search(query, k).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "retrieval failed, continuing without sources");
                Vec::new()
            }
        }
    }

    /// Like [`get_relevant_sources`](Self::get_relevant_sources) but
    /// reports failures to the caller.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedSource>, StoreAccessError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let collection = self.active.collection();
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| StoreAccessError::new("embed query", collection, format!("{:#}", e)))?;

        let hits = self
            .active
            .query(&vector, k)
            .await
            .map_err(|e| StoreAccessError::new("query", collection, e))?;

        debug!(k, hits = hits.len(), "similarity query");
        Ok(hits
            .into_iter()
            .take(k)
            .map(|hit| RetrievedSource {
                content: hit.chunk.content,
                metadata: hit.chunk.metadata,
                similarity_score: Some(hit.score),
            })
            .collect())
    }

    /// Move every active chunk into the archive collection.
    ///
    /// Returns `true` for an already empty store or a completed move,
    /// `false` if any step failed. Nothing is rolled back.
    pub async fn archive_current_documents(&self) -> bool {
        match self.try_archive().await {
            Ok(0) => {
                debug!("nothing to archive");
                true
            }
            Ok(n) => {
                info!(
                    chunks = n,
                    from = self.active.collection(),
                    to = self.archive.collection(),
                    "archived documents"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "archive failed");
                false
            }
        }
    }

    /// Copy, verify, then delete. Re-running after a failed delete is safe:
    /// the archive upserts by id and deleting absent ids is a no-op.
    pub async fn try_archive(&self) -> Result<usize, ArchiveError> {
        let entries = self
            .active
            .fetch_all()
            .await
            .map_err(|e| ArchiveError::Read(StoreAccessError::new("fetch", self.active.collection(), e)))?;
        if entries.is_empty() {
            return Ok(0);
        }

        let (chunks, vectors): (Vec<DocumentChunk>, Vec<Vec<f32>>) =
            entries.into_iter().map(|e| (e.chunk, e.vector)).unzip();
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();

        self.archive
            .add(&chunks, &vectors)
            .await
            .map_err(|e| ArchiveError::Copy(StoreAccessError::new("add", self.archive.collection(), e)))?;

        let archived: HashSet<String> = self
            .archive
            .list_ids()
            .await
            .map_err(|e| ArchiveError::Copy(StoreAccessError::new("list", self.archive.collection(), e)))?
            .into_iter()
            .collect();
        let missing = ids.iter().filter(|id| !archived.contains(*id)).count();
        if missing > 0 {
            return Err(ArchiveError::Unverified {
                missing,
                expected: ids.len(),
            });
        }

        self.active
            .delete(&ids)
            .await
            .map_err(|e| ArchiveError::Delete(StoreAccessError::new("delete", self.active.collection(), e)))?;

        Ok(ids.len())
    }

    /// Delete every active chunk without archiving.
    /// Returns `true` for an already empty store or a completed delete.
    pub async fn clear_documents(&self) -> bool {
        match self.try_clear().await {
            Ok(n) => {
                info!(chunks = n, collection = self.active.collection(), "cleared documents");
                true
            }
            Err(e) => {
                error!(error = %e, "clear failed");
                false
            }
        }
    }

    async fn try_clear(&self) -> Result<usize, ArchiveError> {
        let collection = self.active.collection();
        let ids = self
            .active
            .list_ids()
            .await
            .map_err(|e| ArchiveError::Read(StoreAccessError::new("list", collection, e)))?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.active
            .delete(&ids)
            .await
            .map_err(|e| ArchiveError::Delete(StoreAccessError::new("delete", collection, e)))?;
        Ok(ids.len())
    }
}

async fn count_ids(index: &dyn VectorIndex) -> Result<usize, StoreAccessError> {
    index
        .list_ids()
        .await
        .map(|ids| ids.len())
        .map_err(|e| StoreAccessError::new("list", index.collection(), e))
}
