//! Deterministic stand-ins for the embedding service and the chat model.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use ragchat::app::App;
use ragchat::config::Config;
use ragchat::document_store::DocumentStore;
use ragchat::error::ModelError;
use ragchat::llm::{ChatModel, FragmentStream};
use ragchat_core::embedding::EmbeddingProvider;
use ragchat_core::store::memory::InMemoryIndex;

pub const DIMS: usize = 64;

/// Any text containing this marker fails to embed.
pub const EMBED_FAILURE_MARKER: &str = "unembeddable";

/// Hashes each lowercase word into one of [`DIMS`] buckets.
pub struct BagOfWordsEmbedder;

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(5381u32, |h, b| h.wrapping_mul(33) ^ b as u32);
        v[hash as usize % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(EMBED_FAILURE_MARKER)) {
            bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// How the scripted model answers streaming requests.
#[derive(Clone)]
pub enum StreamScript {
    /// Echo `Answer: <prompt>` in word-sized fragments.
    Echo,
    /// Yield these fragments, then fail.
    FailAfter(Vec<String>),
    /// Fail before the first fragment.
    Refuse,
}

/// A chat model with a fixed relevance verdict and scripted streaming.
pub struct ScriptedModel {
    verdict: std::result::Result<String, String>,
    script: StreamScript,
    pub completions: AtomicUsize,
    pub streamed_prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(verdict: &str) -> Self {
        Self {
            verdict: Ok(verdict.to_string()),
            script: StreamScript::Echo,
            completions: AtomicUsize::new(0),
            streamed_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_classification() -> Self {
        Self {
            verdict: Err("classifier offline".to_string()),
            ..Self::new("")
        }
    }

    pub fn with_script(mut self, script: StreamScript) -> Self {
        self.script = script;
        self
    }

    pub fn completion_count(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.streamed_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> std::result::Result<String, ModelError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone().map_err(ModelError::Remote)
    }

    async fn stream(&self, prompt: &str) -> std::result::Result<FragmentStream, ModelError> {
        self.streamed_prompts.lock().unwrap().push(prompt.to_string());
        let items: Vec<std::result::Result<String, ModelError>> = match &self.script {
            StreamScript::Echo => {
                let answer = format!("Answer: {}", prompt);
                answer
                    .split_inclusive(' ')
                    .map(|w| Ok(w.to_string()))
                    .collect()
            }
            StreamScript::FailAfter(fragments) => fragments
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(ModelError::Request(
                    "connection reset".to_string(),
                ))))
                .collect(),
            StreamScript::Refuse => {
                return Err(ModelError::Status {
                    status: 404,
                    body: "model not found".to_string(),
                })
            }
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

pub struct Harness {
    pub app: App,
    pub model: Arc<ScriptedModel>,
    pub active: Arc<InMemoryIndex>,
    pub archive: Arc<InMemoryIndex>,
}

pub fn harness(model: ScriptedModel) -> Harness {
    let active = Arc::new(InMemoryIndex::new("LocalRAG"));
    let archive = Arc::new(InMemoryIndex::new("LocalRAG_Archive"));
    let store = Arc::new(DocumentStore::new(
        active.clone(),
        archive.clone(),
        Arc::new(BagOfWordsEmbedder),
    ));
    let model = Arc::new(model);
    let app = App::from_parts(&Config::default(), store, model.clone());
    Harness {
        app,
        model,
        active,
        archive,
    }
}

pub async fn collect(stream: ragchat::generator::AnswerStream) -> String {
    use futures::StreamExt;
    stream.collect::<Vec<String>>().await.concat()
}

/// Minimal single-page PDF showing `phrase`, with a correct xref table.
pub fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let objects = [
        "1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n".to_string(),
        "2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n".to_string(),
        "3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n".to_string(),
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        ),
        "5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n".to_string(),
    ];
    for object in &objects {
        offsets.push(out.len());
        out.extend_from_slice(object.as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size 6 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes(),
    );
    out
}
