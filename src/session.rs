//! Chat session: conversation history and the fallback hand-off.
//!
//! When the router answers with the fallback offer, the next user reply is
//! read as the answer to it. `yes` or `y` re-routes the original question
//! with direct mode forced; anything else is declined. Either way the offer
//! is consumed by that reply.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::StreamExt;
use tracing::info;

use ragchat_core::chunk::TextSplitter;
use ragchat_core::models::{RetrievedSource, Turn};

use crate::document_store::DocumentStore;
use crate::error::IngestionError;
use crate::ingest::{ingest_file, sanitize_file_name};
use crate::router::QueryRouter;

pub const WELCOME_MESSAGE: &str = "**Welcome to RAG Chat!**\n\n\
- Upload documents to chat with them\n\
- Switch models with `--model`\n\
- Clear history anytime";

pub const DECLINE_MESSAGE: &str = "Okay, I'll only answer based on the documents I know about.";

/// A completed exchange.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub sources: Vec<RetrievedSource>,
}

/// Result of [`ChatSession::upload`].
#[derive(Debug)]
pub enum UploadOutcome {
    Ingested { chunks: usize },
    AlreadyProcessed,
}

pub struct ChatSession {
    router: Arc<QueryRouter>,
    splitter: TextSplitter,
    history: Vec<Turn>,
    processed_files: BTreeSet<String>,
    /// Question behind an unanswered fallback offer.
    pending_question: Option<String>,
}

impl ChatSession {
    pub fn new(router: Arc<QueryRouter>, splitter: TextSplitter) -> Self {
        Self {
            router,
            splitter,
            history: vec![Turn::assistant(WELCOME_MESSAGE)],
            processed_files: BTreeSet::new(),
            pending_question: None,
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn processed_files(&self) -> impl Iterator<Item = &str> {
        self.processed_files.iter().map(String::as_str)
    }

    fn store(&self) -> &DocumentStore {
        self.router.store()
    }

    /// Answer `prompt`, forwarding each fragment to `on_fragment` as it
    /// arrives.
    pub async fn respond<F>(&mut self, prompt: &str, mut on_fragment: F) -> Reply
    where
        F: FnMut(&str),
    {
        let pending = self.pending_question.take();
        self.history.push(Turn::user(prompt));

        let (mut stream, routed) = match pending {
            Some(original) if is_affirmative(prompt) => {
                info!("user opted for a general-knowledge answer");
                (self.router.route(&original, true).await, true)
            }
            Some(_) => {
                info!("user declined a general-knowledge answer");
                let decline: crate::generator::AnswerStream =
                    Box::pin(futures::stream::once(async { DECLINE_MESSAGE.to_string() }));
                (decline, false)
            }
            None => {
                let answer = self.router.answer(prompt, false).await;
                if answer.offers_fallback {
                    self.pending_question = Some(prompt.to_string());
                }
                (answer.stream, true)
            }
        };

        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            on_fragment(&fragment);
            text.push_str(&fragment);
        }

        let sources = if routed {
            self.router.last_sources()
        } else {
            Vec::new()
        };
        self.history.push(Turn::assistant(text.clone()));
        Reply { text, sources }
    }

    /// Ingest an uploaded file unless a file of the same name was already
    /// processed in this session.
    pub async fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<UploadOutcome, IngestionError> {
        let file = sanitize_file_name(name);
        if self.processed_files.contains(&file) {
            return Ok(UploadOutcome::AlreadyProcessed);
        }
        let chunks = ingest_file(self.store(), &self.splitter, &file, bytes, &BTreeMap::new()).await?;
        self.processed_files.insert(file);
        Ok(UploadOutcome::Ingested { chunks })
    }

    /// Reset the conversation to the welcome message.
    pub fn clear_chat(&mut self) {
        self.history = vec![Turn::assistant(WELCOME_MESSAGE)];
        self.pending_question = None;
    }

    /// Archive the current documents and start over. On failure nothing is
    /// reset and `false` is returned.
    pub async fn new_session(&mut self) -> bool {
        if !self.store().archive_current_documents().await {
            return false;
        }
        self.clear_chat();
        self.processed_files.clear();
        true
    }

    /// Drop the current documents without archiving them.
    pub async fn clear_documents(&mut self) -> bool {
        if !self.store().clear_documents().await {
            return false;
        }
        self.processed_files.clear();
        true
    }
}

fn is_affirmative(reply: &str) -> bool {
    matches!(reply.trim().to_lowercase().as_str(), "yes" | "y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        for r in ["yes", "Y", " YES ", "y\n"] {
            assert!(is_affirmative(r), "{:?}", r);
        }
        for r in ["no", "yes please", "yeah", "", "n"] {
            assert!(!is_affirmative(r), "{:?}", r);
        }
    }
}
