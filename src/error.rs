//! Error kinds for each component boundary.
//!
//! None of these cross a component boundary as a failure of the caller's
//! request: the document store degrades [`StoreAccessError`] to "no
//! documents" or "no sources", the relevance classifier turns a
//! [`ClassificationError`] into a relevant verdict, and the generator
//! renders a [`GenerationError`] as the final text fragment of its stream.
//! [`IngestionError`] and [`ArchiveError`] are reported per call.

use thiserror::Error;

/// Failure at the chat-model boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model response: {0}")]
    Malformed(String),

    #[error("model reported an error: {0}")]
    Remote(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Request(e.to_string())
    }
}

/// A file could not be turned into committed chunks.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("unsupported file type: {0} (only .pdf and .txt are accepted)")]
    UnsupportedType(String),

    #[error("could not read {file}: {reason}")]
    Unreadable { file: String, reason: String },

    #[error("{0} produced no text to index")]
    Empty(String),

    #[error("failed to embed chunks: {0}")]
    Embedding(String),

    #[error(transparent)]
    Store(#[from] StoreAccessError),
}

/// The similarity index could not be reached or queried.
#[derive(Debug, Error)]
#[error("store access failed during {operation} on '{collection}': {message}")]
pub struct StoreAccessError {
    pub operation: &'static str,
    pub collection: String,
    pub message: String,
}

impl StoreAccessError {
    pub fn new(operation: &'static str, collection: &str, err: impl std::fmt::Display) -> Self {
        Self {
            operation,
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }
}

/// The relevance check could not reach a verdict.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Store(#[from] StoreAccessError),

    #[error("relevance model call failed: {0}")]
    Model(#[from] ModelError),
}

/// The model failed before or during streaming an answer.
#[derive(Debug, Error)]
#[error("Query failed: {0}")]
pub struct GenerationError(#[from] pub ModelError);

/// A step of the archive or clear sequence failed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read active documents: {0}")]
    Read(StoreAccessError),

    #[error("failed to copy documents to archive: {0}")]
    Copy(StoreAccessError),

    #[error("archive is missing {missing} of {expected} copied documents")]
    Unverified { missing: usize, expected: usize },

    #[error("failed to delete active documents: {0}")]
    Delete(StoreAccessError),
}
