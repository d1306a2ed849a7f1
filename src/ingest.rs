//! Ingestion boundary: uploaded files to committed chunks.
//!
//! A file is accepted only if its name ends in `.pdf` or `.txt`
//! (case-insensitive). Accepted bytes are extracted to text, split with the
//! configured [`TextSplitter`], and handed to
//! [`DocumentStore::add_documents`] as a single batch. Failures are reported
//! per file and never abort the rest of a batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};

use ragchat_core::chunk::{ChunkOrigin, TextSplitter};
use ragchat_core::models::ContentKind;

use crate::document_store::DocumentStore;
use crate::error::IngestionError;
use crate::extract::{extract_text, ExtractError};

/// Accepted upload kinds.
pub use ragchat_core::models::ContentKind as FileKind;

/// Outcome of ingesting one file.
#[derive(Debug)]
pub struct FileReport {
    pub file: String,
    /// Number of chunks committed, or why the file was rejected.
    pub outcome: Result<usize, IngestionError>,
}

impl FileReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Detect the file kind from its extension.
pub fn detect_kind(file_name: &str) -> Result<FileKind, IngestionError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => Ok(ContentKind::Pdf),
        Some("txt") => Ok(ContentKind::PlainText),
        _ => Err(IngestionError::UnsupportedType(file_name.to_string())),
    }
}

/// Reduce an uploaded name to its final path component.
///
/// Both `/` and `\` count as separators, so `..\..\x.txt` and
/// `../../x.txt` both become `x.txt`.
pub fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Extract, split and commit one file. Returns the number of chunks
/// committed.
pub async fn ingest_file(
    store: &DocumentStore,
    splitter: &TextSplitter,
    name: &str,
    bytes: &[u8],
    tags: &BTreeMap<String, String>,
) -> Result<usize, IngestionError> {
    let file = sanitize_file_name(name);
    let kind = detect_kind(&file)?;

    let text = extract_text(bytes, kind).map_err(|e| IngestionError::Unreadable {
        file: file.clone(),
        reason: match e {
            ExtractError::Pdf(reason) => reason,
            ExtractError::Encoding(err) => err.to_string(),
        },
    })?;

    let origin = ChunkOrigin {
        source: file.clone(),
        kind,
        ingested_at: Utc::now(),
        tags: tags.clone(),
    };
    let chunks = splitter.split_document(&origin, &text);
    if chunks.is_empty() {
        return Err(IngestionError::Empty(file));
    }

    store.add_documents(&chunks).await?;
    info!(file = %file, kind = kind.as_str(), chunks = chunks.len(), "ingested file");
    Ok(chunks.len())
}

/// Ingest a batch of `(name, bytes)` uploads, one report per file.
pub async fn ingest_files(
    store: &DocumentStore,
    splitter: &TextSplitter,
    files: Vec<(String, Vec<u8>)>,
) -> Vec<FileReport> {
    let mut reports = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let outcome = ingest_file(store, splitter, &name, &bytes, &BTreeMap::new()).await;
        if let Err(e) = &outcome {
            error!(file = %name, error = %e, "failed to ingest file");
        }
        reports.push(FileReport {
            file: sanitize_file_name(&name),
            outcome,
        });
    }
    reports
}

/// Read files from disk and ingest them.
///
/// Unsupported extensions are rejected before the file is read.
pub async fn ingest_paths(
    store: &DocumentStore,
    splitter: &TextSplitter,
    paths: &[PathBuf],
    tags: &BTreeMap<String, String>,
) -> Vec<FileReport> {
    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path.to_string_lossy().to_string();
        let file = sanitize_file_name(&name);
        let outcome = match detect_kind(&file) {
            Err(e) => Err(e),
            Ok(_) => match tokio::fs::read(path).await {
                Ok(bytes) => ingest_file(store, splitter, &name, &bytes, tags).await,
                Err(e) => Err(IngestionError::Unreadable {
                    file: file.clone(),
                    reason: e.to_string(),
                }),
            },
        };
        if let Err(e) = &outcome {
            warn!(path = %path.display(), error = %e, "skipping file");
        }
        reports.push(FileReport { file, outcome });
    }
    reports
}
