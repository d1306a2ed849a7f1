//! Query router: the per-query decision procedure.
//!
//! ```text
//! query ──► store empty? ──yes──► EmptyStore   ─► direct answer
//!   │
//!   ├────► forced direct? ─yes──► ForcedDirect ─► direct answer
//!   │
//!   └────► classifier ─small talk─► Conversational ─► direct answer
//!                     ─false──────► NotRelevant    ─► fallback message
//!                     ─true───────► Relevant       ─► grounded answer
//! ```
//!
//! Routes are transient; the only state kept between calls is the list of
//! sources used for the most recent answer. The router never fails: a panic
//! in any collaborator while deciding is caught and turned into a single
//! error fragment.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use futures::FutureExt;
use tracing::{error, info};

use ragchat_core::models::RetrievedSource;

use crate::document_store::DocumentStore;
use crate::generator::{AnswerStream, GenerationMode, ResponseGenerator};
use crate::relevance::{Relevance, RelevanceClassifier};

/// Offered when the documents don't cover the question.
pub const FALLBACK_MESSAGE: &str = "I couldn't find anything about that in your documents. \
Would you like me to answer using general knowledge? (yes/no)";

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    EmptyStore,
    ForcedDirect,
    Conversational,
    NotRelevant,
    Relevant(Vec<RetrievedSource>),
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::EmptyStore => "empty_store",
            Route::ForcedDirect => "forced_direct",
            Route::Conversational => "conversational",
            Route::NotRelevant => "not_relevant",
            Route::Relevant(_) => "relevant",
        }
    }
}

/// An answer stream plus whether it is the fallback offer.
pub struct RoutedAnswer {
    pub stream: AnswerStream,
    pub offers_fallback: bool,
}

pub struct QueryRouter {
    store: Arc<DocumentStore>,
    classifier: RelevanceClassifier,
    generator: ResponseGenerator,
    last_sources: RwLock<Vec<RetrievedSource>>,
}

impl QueryRouter {
    pub fn new(
        store: Arc<DocumentStore>,
        classifier: RelevanceClassifier,
        generator: ResponseGenerator,
    ) -> Self {
        Self {
            store,
            classifier,
            generator,
            last_sources: RwLock::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Decide how to answer `query` and return the answer stream.
    pub async fn route(&self, query: &str, force_direct: bool) -> AnswerStream {
        self.answer(query, force_direct).await.stream
    }

    /// Like [`route`](Self::route), also reporting whether the answer is
    /// the fallback offer.
    pub async fn answer(&self, query: &str, force_direct: bool) -> RoutedAnswer {
        match AssertUnwindSafe(self.decide(query, force_direct))
            .catch_unwind()
            .await
        {
            Ok(route) => {
                info!(route = route.name(), "routed query");
                let offers_fallback = route == Route::NotRelevant;
                RoutedAnswer {
                    stream: self.respond(query, route),
                    offers_fallback,
                }
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "internal error".to_string());
                error!(reason = %reason, "routing failed");
                self.set_last_sources(Vec::new());
                RoutedAnswer {
                    stream: single_fragment(format!("Query failed: {}", reason)),
                    offers_fallback: false,
                }
            }
        }
    }

    /// Classify `query` without generating anything.
    pub async fn decide(&self, query: &str, force_direct: bool) -> Route {
        if !self.store.has_documents().await {
            return Route::EmptyStore;
        }
        if force_direct {
            return Route::ForcedDirect;
        }
        match self.classifier.classify(query).await {
            Relevance::Conversational => return Route::Conversational,
            Relevance::NotRelevant => return Route::NotRelevant,
            Relevance::Relevant => {}
        }
        let sources = self
            .store
            .get_relevant_sources(query, self.generator.max_context_docs())
            .await;
        Route::Relevant(sources)
    }

    fn respond(&self, query: &str, route: Route) -> AnswerStream {
        match route {
            Route::EmptyStore | Route::ForcedDirect | Route::Conversational => {
                self.set_last_sources(Vec::new());
                self.generator.generate(query, GenerationMode::Direct)
            }
            Route::NotRelevant => {
                self.set_last_sources(Vec::new());
                single_fragment(FALLBACK_MESSAGE.to_string())
            }
            Route::Relevant(sources) => {
                let stream = self.generator.generate_with_sources(query, &sources);
                self.set_last_sources(sources);
                stream
            }
        }
    }

    /// Sources behind the most recent answer; empty after a direct answer,
    /// the fallback message, or an error.
    pub fn last_sources(&self) -> Vec<RetrievedSource> {
        self.last_sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_last_sources(&self, sources: Vec<RetrievedSource>) {
        *self.last_sources.write().unwrap_or_else(|e| e.into_inner()) = sources;
    }
}

fn single_fragment(text: String) -> AnswerStream {
    Box::pin(futures::stream::once(async move { text }))
}
