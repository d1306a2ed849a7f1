//! Deterministic recursive character splitter.
//!
//! Splits extracted file text into [`DocumentChunk`]s of at most
//! `chunk_size` characters, carrying `chunk_overlap` characters of context
//! from the end of one chunk into the start of the next.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` splits into single characters).
//! 2. Split on it, keeping the separator attached to the start of the
//!    following piece so no text is lost.
//! 3. Pieces shorter than `chunk_size` are greedily merged into chunks;
//!    when a chunk fills up, pieces are dropped from its front until at most
//!    `chunk_overlap` characters remain, and merging continues.
//! 4. Pieces that are still too long are split again with the remaining,
//!    finer separators.
//! 5. Chunks are trimmed; empty chunks are discarded.
//!
//! Lengths are measured in Unicode scalar values, never bytes, so
//! multi-byte text is never cut inside a character.
//!
//! Each chunk's ID is derived from a SHA-256 of its origin, index, and
//! text, so re-splitting identical input with identical parameters yields
//! identical chunks and identical IDs.
//!
//! # Example
//!
//! ```rust
//! use ragchat_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(2048, 16);
//! let pieces = splitter.split_text("Hello world.\n\nSecond paragraph.");
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{ChunkMetadata, ContentKind, DocumentChunk};

/// Separators tried in order, coarsest first.
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Where a batch of chunks came from. Copied into every chunk's metadata.
#[derive(Debug, Clone)]
pub struct ChunkOrigin {
    pub source: String,
    pub kind: ContentKind,
    pub ingested_at: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
}

/// Recursive character splitter parameterized by `(chunk_size, chunk_overlap)`.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter. `chunk_size` is clamped to at least 1 and
    /// `chunk_overlap` to below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into trimmed, non-empty pieces.
    ///
    /// Returns an empty vector for empty or whitespace-only text.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    /// Split text and wrap each piece as a [`DocumentChunk`] with
    /// contiguous `chunk_index` values starting at 0.
    pub fn split_document(&self, origin: &ChunkOrigin, text: &str) -> Vec<DocumentChunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| DocumentChunk {
                id: chunk_id(&origin.source, index, &content),
                content,
                metadata: ChunkMetadata {
                    source: origin.source.clone(),
                    chunk_index: index,
                    kind: origin.kind,
                    ingested_at: origin.ingested_at,
                    tags: origin.tags.clone(),
                },
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge_pieces(&small));
                small.clear();
            }
            if finer.is_empty() {
                if let Some(trimmed) = non_empty_trimmed(piece) {
                    chunks.push(trimmed);
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge_pieces(&small));
        }
        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_window(&window) {
                    merged.push(doc);
                }
                // Shrink to the overlap, and far enough that the next piece fits.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_window(&window) {
            merged.push(doc);
        }
        merged
    }
}

/// Split `text` on `separator`, attaching each separator occurrence to the
/// start of the piece that follows it. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    non_empty_trimmed(&joined)
}

fn non_empty_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Stable chunk ID: the first 16 bytes of `SHA-256(source, index, content)`
/// rendered as a UUID.
pub fn chunk_id(source: &str, index: usize, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update((index as u64).to_le_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}
