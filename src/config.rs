//! TOML configuration parsing and validation.
//!
//! Every section and field has a default, so an empty file (or no file at
//! the default location) yields a working local setup: Ollama on
//! `localhost:11434`, `llama3.2:latest` for chat, `nomic-embed-text` for
//! embeddings, and two SQLite-backed collections for active and archived
//! documents.
//!
//! ```toml
//! [llm]
//! model = "llama3.2:latest"
//!
//! [chunking]
//! chunk_size = 2048
//! chunk_overlap = 16
//!
//! [retrieval]
//! max_context_docs = 3
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Location used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/ragchat.toml";

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            url: default_ollama_url(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "llama3.2:latest".to_string()
}
fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embedding_url")]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            url: default_embedding_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("nomic-embed-text".to_string())
}
fn default_embedding_url() -> Option<String> {
    Some(DEFAULT_OLLAMA_URL.to_string())
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,
    #[serde(default = "default_archive_collection")]
    pub archive_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
            archive_path: default_archive_path(),
            archive_collection: default_archive_collection(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./chroma/ragchat.sqlite")
}
fn default_collection() -> String {
    "LocalRAG".to_string()
}
fn default_archive_path() -> PathBuf {
    PathBuf::from("./chroma_archive/ragchat.sqlite")
}
fn default_archive_collection() -> String {
    "LocalRAG_Archive".to_string()
}

/// Splitter parameters, in characters.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    2048
}
fn default_chunk_overlap() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks retrieved as context for grounded answers.
    #[serde(default = "default_max_context_docs")]
    pub max_context_docs: usize,
    /// Chunks shown to the model when asking whether a query is relevant.
    #[serde(default = "default_relevance_probe_docs")]
    pub relevance_probe_docs: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_docs: default_max_context_docs(),
            relevance_probe_docs: default_relevance_probe_docs(),
        }
    }
}

fn default_max_context_docs() -> usize {
    3
}
fn default_relevance_probe_docs() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load and validate the configuration at `path`.
///
/// A missing file is only tolerated at [`DEFAULT_CONFIG_PATH`], where it
/// yields [`Config::default`].
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.max_context_docs < 1 {
        anyhow::bail!("retrieval.max_context_docs must be >= 1");
    }
    if config.retrieval.relevance_probe_docs < 1 {
        anyhow::bail!("retrieval.relevance_probe_docs must be >= 1");
    }

    // Validate store
    if config.store.collection.is_empty() || config.store.archive_collection.is_empty() {
        anyhow::bail!("store.collection and store.archive_collection must not be empty");
    }
    if config.store.path == config.store.archive_path
        && config.store.collection == config.store.archive_collection
    {
        anyhow::bail!(
            "store.archive_collection must differ from store.collection when both share '{}'",
            config.store.path.display()
        );
    }

    // Validate embedding
    if config.embedding.is_enabled() && config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is 'ollama'");
            }
        }
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified when provider is 'openai'");
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, openai, or local.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.llm.model, "llama3.2:latest");
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.model.as_deref(), Some("nomic-embed-text"));
        assert_eq!(config.store.collection, "LocalRAG");
        assert_eq!(config.store.archive_collection, "LocalRAG_Archive");
        assert_eq!(config.chunking.chunk_size, 2048);
        assert_eq!(config.chunking.chunk_overlap, 16);
        assert_eq!(config.retrieval.max_context_docs, 3);
        assert_eq!(config.retrieval.relevance_probe_docs, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
[llm]
model = "mistral:7b"

[chunking]
chunk_size = 512
"#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "mistral:7b");
        assert_eq!(config.llm.url, "http://localhost:11434");
        assert_eq!(config.chunking.chunk_size, 512);
        assert_eq!(config.chunking.chunk_overlap, 16);
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse_config("[chunking]\nchunk_size = 10\nchunk_overlap = 10\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_rejects_zero_context_docs() {
        assert!(parse_config("[retrieval]\nmax_context_docs = 0\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse_config("[embedding]\nprovider = \"cohere\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_openai_requires_dims() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config("[embedding]\nprovider = \"openai\"\ndims = 1536\n").is_ok());
    }

    #[test]
    fn test_rejects_shared_collection() {
        let toml = r#"
[store]
path = "./one.sqlite"
archive_path = "./one.sqlite"
collection = "docs"
archive_collection = "docs"
"#;
        assert!(parse_config(toml).is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_config(&tmp.path().join("nope.toml")).is_err());
    }
}
