//! Response generator: streams an answer in direct or grounded mode.
//!
//! The returned [`AnswerStream`] never fails. Model errors, whether raised
//! before the first fragment or mid-stream, become one final fragment
//! reading `Query failed: ...`, after which the stream ends.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info};

use ragchat_core::models::RetrievedSource;

use crate::document_store::DocumentStore;
use crate::error::GenerationError;
use crate::llm::ChatModel;

/// Answer text, in fragments to be concatenated in arrival order.
pub type AnswerStream = Pin<Box<dyn Stream<Item = String> + Send>>;

pub const PROMPT_TEMPLATE: &str = "You're a helpful AI assistant. Use this context to answer:
{context}

Question: {question}

Provide a concise, factual answer in Markdown. If unsure, say so.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// The raw query, no retrieved context.
    Direct,
    /// The query wrapped in [`PROMPT_TEMPLATE`] with retrieved context.
    Grounded,
}

pub struct ResponseGenerator {
    store: Arc<DocumentStore>,
    model: Arc<dyn ChatModel>,
    max_context_docs: usize,
}

impl ResponseGenerator {
    pub fn new(store: Arc<DocumentStore>, model: Arc<dyn ChatModel>, max_context_docs: usize) -> Self {
        Self {
            store,
            model,
            max_context_docs,
        }
    }

    pub fn max_context_docs(&self) -> usize {
        self.max_context_docs
    }

    /// Generate an answer, retrieving context when `mode` is grounded.
    ///
    /// Grounded mode with no retrievable sources runs in direct mode.
    pub fn generate(&self, query: &str, mode: GenerationMode) -> AnswerStream {
        match mode {
            GenerationMode::Direct => self.stream_prompt(query.to_string()),
            GenerationMode::Grounded => {
                let store = self.store.clone();
                let model = self.model.clone();
                let k = self.max_context_docs;
                let query = query.to_string();
                Box::pin(stream! {
                    let sources = store.get_relevant_sources(&query, k).await;
                    let mut inner = answer_stream(model, prompt_for(&query, &sources));
                    while let Some(fragment) = inner.next().await {
                        yield fragment;
                    }
                })
            }
        }
    }

    /// Stream an answer grounded in `sources` that the caller already
    /// retrieved. An empty `sources` list answers directly.
    pub fn generate_with_sources(&self, query: &str, sources: &[RetrievedSource]) -> AnswerStream {
        self.stream_prompt(prompt_for(query, sources))
    }

    fn stream_prompt(&self, prompt: String) -> AnswerStream {
        answer_stream(self.model.clone(), prompt)
    }
}

/// The filled template, or the bare query when there is no context.
pub fn prompt_for(query: &str, sources: &[RetrievedSource]) -> String {
    if sources.is_empty() {
        debug!("no context retrieved, answering directly");
        return query.to_string();
    }
    let context = sources
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    fill_template(PROMPT_TEMPLATE, &context, query)
}

/// Substitute `{context}` and `{question}` in a single pass over `template`,
/// so placeholder text inside the values is left as is.
pub(crate) fn fill_template(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn answer_stream(model: Arc<dyn ChatModel>, prompt: String) -> AnswerStream {
    Box::pin(stream! {
        let mut fragments = match model.stream(&prompt).await {
            Ok(fragments) => fragments,
            Err(e) => {
                let e = GenerationError::from(e);
                error!(error = %e, "generation failed");
                yield e.to_string();
                return;
            }
        };

        let mut count = 0usize;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    count += 1;
                    yield fragment;
                }
                Err(e) => {
                    let e = GenerationError::from(e);
                    error!(error = %e, fragments = count, "generation failed mid-stream");
                    yield e.to_string();
                    return;
                }
            }
        }
        info!(fragments = count, "query processed successfully");
    })
}
