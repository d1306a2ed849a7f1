//! Explicit construction of the runtime components from configuration.
//!
//! The binary builds everything once at startup and passes handles down;
//! there is no global store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use ragchat_core::chunk::TextSplitter;

use crate::config::Config;
use crate::document_store::DocumentStore;
use crate::embedding::create_provider;
use crate::generator::ResponseGenerator;
use crate::llm::{ChatModel, OllamaChat};
use crate::relevance::RelevanceClassifier;
use crate::router::QueryRouter;
use crate::sqlite_index::SqliteIndex;

pub struct App {
    pub store: Arc<DocumentStore>,
    pub model: Arc<dyn ChatModel>,
    pub router: Arc<QueryRouter>,
    pub splitter: TextSplitter,
}

impl App {
    /// Open both collections and connect the chat model.
    pub async fn build(config: &Config) -> Result<Self> {
        let store = Arc::new(open_store(config).await?);
        let model: Arc<dyn ChatModel> =
            Arc::new(OllamaChat::new(&config.llm).context("Failed to create chat model client")?);
        Ok(Self::from_parts(config, store, model))
    }

    /// Wire the core components around an existing store and model.
    pub fn from_parts(config: &Config, store: Arc<DocumentStore>, model: Arc<dyn ChatModel>) -> Self {
        let classifier = RelevanceClassifier::new(
            store.clone(),
            model.clone(),
            config.retrieval.relevance_probe_docs,
        );
        let generator = ResponseGenerator::new(
            store.clone(),
            model.clone(),
            config.retrieval.max_context_docs,
        );
        let router = Arc::new(QueryRouter::new(store.clone(), classifier, generator));
        Self {
            store,
            model,
            router,
            splitter: TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
        }
    }
}

/// Open the active and archive SQLite collections with the configured
/// embedding provider.
pub async fn open_store(config: &Config) -> Result<DocumentStore> {
    let active = SqliteIndex::open(&config.store.path, &config.store.collection).await?;
    let archive = SqliteIndex::open(&config.store.archive_path, &config.store.archive_collection).await?;
    let embedder = create_provider(&config.embedding)?;
    info!(
        active = %config.store.path.display(),
        archive = %config.store.archive_path.display(),
        embedder = embedder.model_name(),
        "opened document store"
    );
    Ok(DocumentStore::new(
        Arc::new(active),
        Arc::new(archive),
        Arc::from(embedder),
    ))
}
