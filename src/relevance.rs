//! Relevance classifier: decides whether a query should be answered from
//! the current documents.
//!
//! Two stages, in order:
//!
//! 1. **Conversational fast path.** Small talk (thanks, goodbyes, greetings)
//!    and questions addressed to the assistant itself ("can you...",
//!    "what are you...", "how do you...") are classified as not relevant
//!    without touching the store or the model.
//! 2. **Model check.** The top chunks for the query are shown to the model
//!    with a yes/no prompt. The verdict is relevant iff the lowercased,
//!    trimmed reply contains `"relevant"`.
//!
//! Stage 1 short-circuits even when the documents could answer the query.
//! Any failure in stage 2 fails open to relevant.
//!
//! [`RelevanceClassifier::classify`] reports which stage decided, so the
//! router can answer small talk directly instead of offering the fallback.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::document_store::DocumentStore;
use crate::error::ClassificationError;
use crate::generator::fill_template;
use crate::llm::ChatModel;

const RELEVANCE_PROMPT: &str = "Decide whether the context below helps answer the question.\n\
If it does, reply with the single word \"relevant\". If it does not, reply with the single word \"no\".\n\n\
Context:\n{context}\n\n\
Question: {question}";

/// Gratitude, farewell and greeting phrases that make up the whole query.
static RE_SMALL_TALK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(thanks?( you)?( so much| a lot)?|thx|ty|cheers|ok(ay)?|cool|great|bye|goodbye|good ?night|see (you|ya)( later)?|hi|hello|hey|good (morning|afternoon|evening))( there)?[\s!.,]*$",
    )
    .ok()
});

/// Modal openers and question words directed at the assistant.
static RE_ASSISTANT_QUESTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^((can|could|would|will) you\b|(what|how|who|why|when|where)\b.*\b(you|your|yourself)\b)",
    )
    .ok()
});

/// True if `query` matches a conversational pattern and should skip
/// retrieval entirely.
pub fn is_conversational(query: &str) -> bool {
    let query = query.trim();
    [&RE_SMALL_TALK, &RE_ASSISTANT_QUESTION]
        .into_iter()
        .filter_map(|re| LazyLock::force(re).as_ref())
        .any(|re| re.is_match(query))
}

/// Outcome of [`RelevanceClassifier::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    /// Matched the conversational fast path; no store or model call made.
    Conversational,
    NotRelevant,
    Relevant,
}

pub struct RelevanceClassifier {
    store: Arc<DocumentStore>,
    model: Arc<dyn ChatModel>,
    probe_docs: usize,
}

impl RelevanceClassifier {
    /// `probe_docs` is the number of chunks shown to the model (at least 1).
    pub fn new(store: Arc<DocumentStore>, model: Arc<dyn ChatModel>, probe_docs: usize) -> Self {
        Self {
            store,
            model,
            probe_docs: probe_docs.max(1),
        }
    }

    /// True iff `query` should be answered from the documents.
    pub async fn is_relevant(&self, query: &str) -> bool {
        self.classify(query).await == Relevance::Relevant
    }

    pub async fn classify(&self, query: &str) -> Relevance {
        if is_conversational(query) {
            debug!("conversational query, skipping relevance check");
            return Relevance::Conversational;
        }

        match self.check_with_model(query).await {
            Ok(true) => Relevance::Relevant,
            Ok(false) => {
                debug!("model judged query not relevant");
                Relevance::NotRelevant
            }
            Err(e) => {
                warn!(error = %e, "relevance check failed, assuming relevant");
                Relevance::Relevant
            }
        }
    }

    async fn check_with_model(&self, query: &str) -> Result<bool, ClassificationError> {
        let sources = self.store.search(query, self.probe_docs).await?;
        let context = sources
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = fill_template(RELEVANCE_PROMPT, &context, query);
        let reply = self.model.complete(&prompt).await?;
        Ok(parse_verdict(&reply))
    }
}

/// Substring check on the normalized reply. The prompt's negative answer is
/// "no" because "not relevant" would also match.
fn parse_verdict(reply: &str) -> bool {
    reply.trim().to_lowercase().contains("relevant")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_talk_is_conversational() {
        for q in [
            "thanks!",
            "Thank you so much.",
            "thx",
            "bye",
            "Goodbye!",
            "see you later",
            "hello there",
            "Good morning",
        ] {
            assert!(is_conversational(q), "expected {:?} to be conversational", q);
        }
    }

    #[test]
    fn test_assistant_questions_are_conversational() {
        for q in [
            "Can you help me?",
            "could you write a poem",
            "What can you do?",
            "how are you",
            "Who are you?",
            "What is your name?",
        ] {
            assert!(is_conversational(q), "expected {:?} to be conversational", q);
        }
    }

    #[test]
    fn test_document_questions_are_not_conversational() {
        for q in [
            "What is the capital of Freedonia?",
            "Summarize the quarterly report",
            "thanks for the summary of chapter three, now explain chapter four",
            "How does the billing module handle refunds?",
            "",
        ] {
            assert!(!is_conversational(q), "expected {:?} to need the check", q);
        }
    }

    #[test]
    fn test_parse_verdict() {
        assert!(parse_verdict("relevant"));
        assert!(parse_verdict("  Relevant.\n"));
        assert!(parse_verdict("RELEVANT"));
        assert!(parse_verdict("not relevant"));
        assert!(!parse_verdict("no"));
        assert!(!parse_verdict(""));
    }

    #[test]
    fn test_relevance_prompt_carries_context_verbatim() {
        let prompt = fill_template(RELEVANCE_PROMPT, "Write {question} in braces.", "What is a slot?");
        assert!(prompt.contains("Context:\nWrite {question} in braces.\n\nQuestion: What is a slot?"));
    }
}
