//! Chat model boundary.
//!
//! [`ChatModel`] is the text-completion service the classifier and the
//! generator talk to: one-shot completion for yes/no classification and
//! incremental streaming for answers. [`OllamaChat`] implements it against
//! a local Ollama server.
//!
//! Ollama streams newline-delimited JSON objects:
//!
//! ```text
//! {"message":{"role":"assistant","content":"The"},"done":false}
//! {"message":{"role":"assistant","content":" capital"},"done":false}
//! {"message":{"role":"assistant","content":""},"done":true}
//! ```
//!
//! Network chunks do not align with lines, so partial lines are buffered
//! until their newline arrives.

use std::pin::Pin;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::ModelError;

/// Incremental text deltas from a model, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier (e.g. `"llama3.2:latest"`).
    fn name(&self) -> &str;

    /// Single-shot completion of `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Streaming completion of `prompt`.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, ModelError>;

    /// Models the backing service can serve.
    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        Ok(vec![self.name().to_string()])
    }
}

/// [`ChatModel`] backed by Ollama's `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaChat {
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Timeout for the model listing call.
const LIST_MODELS_TIMEOUT: Duration = Duration::from_secs(5);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl OllamaChat {
    /// `llm.timeout_secs` bounds a whole single-shot completion. For
    /// streamed answers it is the longest allowed gap between chunks, so
    /// long generations are not cut off.
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(timeout)
            .build()?;
        info!(model = %config.model, url = %config.url, "initializing chat model");
        Ok(Self {
            model: config.model.clone(),
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    fn chat_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": stream,
        })
    }

    async fn post_chat(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, ModelError> {
        let mut request = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.chat_body(prompt, stream));
        if !stream {
            request = request.timeout(self.timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self.post_chat(prompt, false).await?;
        let chunk: ChatChunk = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        if let Some(err) = chunk.error {
            return Err(ModelError::Remote(err));
        }
        chunk
            .message
            .map(|m| m.content)
            .ok_or_else(|| ModelError::Malformed("missing message".to_string()))
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream, ModelError> {
        let response = self.post_chat(prompt, true).await?;
        Ok(Box::pin(fragments(response.bytes_stream())))
    }

    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(LIST_MODELS_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;
        Ok(order_models(
            tags.models.into_iter().map(|m| m.name).collect(),
            &self.model,
        ))
    }
}

/// Sort model names alphabetically with `preferred` first.
pub fn order_models(mut models: Vec<String>, preferred: &str) -> Vec<String> {
    models.sort();
    models.sort_by_key(|m| m != preferred);
    models
}

/// Parse one NDJSON line. Sets `done` when the model signals completion.
fn parse_stream_line(line: &str, done: &mut bool) -> Result<Option<String>, ModelError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let chunk: ChatChunk =
        serde_json::from_str(line).map_err(|e| ModelError::Malformed(e.to_string()))?;
    if let Some(err) = chunk.error {
        return Err(ModelError::Remote(err));
    }
    *done = chunk.done;
    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

/// Decode an NDJSON chat response body into answer fragments.
fn fragments<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, ModelError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Into<ModelError> + Send,
{
    let mut bytes = Box::pin(bytes);
    try_stream! {
        let mut lines = LineBuffer::default();
        let mut done = false;

        while !done {
            let Some(item) = bytes.next().await else { break };
            let chunk = item.map_err(Into::<ModelError>::into)?;
            for line in lines.push(chunk.as_ref()) {
                if let Some(fragment) = parse_stream_line(&line, &mut done)? {
                    yield fragment;
                }
                if done {
                    break;
                }
            }
        }

        if !done {
            if let Some(line) = lines.finish() {
                if let Some(fragment) = parse_stream_line(&line, &mut done)? {
                    yield fragment;
                }
            }
        }
        debug!("model stream finished");
    }
}

/// Reassembles newline-terminated lines from arbitrarily split byte chunks.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
