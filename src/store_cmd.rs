//! Document store commands: `init`, `ingest`, `archive`, `clear`, `status`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::app::open_store;
use crate::config::Config;
use crate::ingest::{ingest_paths, FileReport};
use crate::sqlite_index::SqliteIndex;

use ragchat_core::chunk::TextSplitter;

/// Create both databases and their schema. Idempotent.
pub async fn run_init(config: &Config) -> Result<()> {
    for (path, collection) in [
        (&config.store.path, &config.store.collection),
        (&config.store.archive_path, &config.store.archive_collection),
    ] {
        let index = SqliteIndex::open(path, collection).await?;
        index.close().await;
        println!("Initialized {} ({})", path.display(), collection);
    }
    Ok(())
}

/// Ingest files from disk, printing one line per file. Fails if any file
/// was rejected.
pub async fn run_ingest(config: &Config, paths: &[PathBuf], tags: Vec<(String, String)>) -> Result<()> {
    let store = open_store(config).await?;
    let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
    let tags: BTreeMap<String, String> = tags.into_iter().collect();

    let reports = ingest_paths(&store, &splitter, paths, &tags).await;
    print_reports(&reports);

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    if failed > 0 {
        bail!("{} of {} files failed to ingest", failed, reports.len());
    }
    Ok(())
}

fn print_reports(reports: &[FileReport]) {
    for report in reports {
        match &report.outcome {
            Ok(chunks) => println!("  ✓ {} ({} chunks)", report.file, chunks),
            Err(e) => println!("  ✗ {}: {}", report.file, e),
        }
    }
    let ok = reports.iter().filter(|r| r.succeeded()).count();
    println!("Ingested {} of {} files.", ok, reports.len());
}

pub async fn run_archive(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let count = store.document_count().await?;
    if !store.archive_current_documents().await {
        bail!("Archive failed; active documents were left in place");
    }
    println!(
        "Archived {} chunks from '{}' to '{}'.",
        count, config.store.collection, config.store.archive_collection
    );
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let count = store.document_count().await?;
    if !store.clear_documents().await {
        bail!("Clear failed");
    }
    println!("Removed {} chunks from '{}'.", count, config.store.collection);
    Ok(())
}

pub async fn run_status(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let active = store.document_count().await?;
    let archived = store.archived_count().await?;

    println!("Active collection:  {} ({} chunks)", config.store.collection, active);
    println!("  at {}", config.store.path.display());
    println!(
        "Archive collection: {} ({} chunks)",
        config.store.archive_collection, archived
    );
    println!("  at {}", config.store.archive_path.display());
    println!("Chat model:         {}", config.llm.model);
    println!(
        "Embeddings:         {} ({})",
        config.embedding.provider,
        config.embedding.model.as_deref().unwrap_or("-")
    );
    Ok(())
}
