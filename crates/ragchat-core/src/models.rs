//! Core data models shared by ingestion, retrieval, and routing.
//!
//! These types represent the chunks, retrieved sources, and conversation
//! turns that flow between the document store, the relevance classifier,
//! the response generator, and the query router.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared kind of the file a chunk was split from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Pdf,
    PlainText,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::PlainText => "plain_text",
        }
    }
}

/// Structured provenance for a [`DocumentChunk`].
///
/// Validated at ingestion time: `source` is never empty and `chunk_index`
/// is the chunk's position within the split of its origin file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Origin file name (final path component only).
    pub source: String,
    /// Zero-based position of the chunk within its origin file.
    pub chunk_index: usize,
    pub kind: ContentKind,
    pub ingested_at: DateTime<Utc>,
    /// Free-form tags supplied by the caller.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl fmt::Display for ChunkMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chunk {})", self.source, self.chunk_index)?;
        for (k, v) in &self.tags {
            write!(f, ", {}={}", k, v)?;
        }
        Ok(())
    }
}

/// A contiguous span of text from one uploaded file; the unit of indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier, preserved across archive and clear operations.
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by a similarity query, surfaced next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedSource {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query, when the index reports one.
    pub similarity_score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
