//! # ragchat
//!
//! A local retrieval-augmented chat assistant.
//!
//! Uploaded PDF and text files are split, embedded and stored in a SQLite
//! vector collection. Each query is routed: small talk and questions the
//! documents don't cover are answered from general knowledge (after asking
//! the user), and the rest are answered with retrieved context.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   query ───────▶│ QueryRouter  │──── last_sources
//!                 └──┬────────┬──┘
//!                    │        │
//!          ┌─────────▼──┐  ┌──▼────────────────┐
//!          │ Relevance  │  │ ResponseGenerator │──▶ streamed answer
//!          │ Classifier │  └──┬─────────────┬──┘
//!          └──┬──────┬──┘     │             │
//!             │      │        │             │
//!             │   ┌──▼────────▼──┐   ┌──────▼─────┐
//!             │   │ DocumentStore│   │ ChatModel  │
//!             │   └──┬────────┬──┘   │  (Ollama)  │
//!             │      │        │      └──────▲─────┘
//!             │   active   archive          │
//!             │   SQLite   SQLite           │
//!             └─────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | tracing subscriber setup |
//! | [`error`] | Error kinds per component boundary |
//! | [`db`] / [`migrate`] | SQLite connection and schema |
//! | [`sqlite_index`] | SQLite vector collection |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat model client |
//! | [`extract`] / [`ingest`] | File text extraction and ingestion |
//! | [`document_store`] | Ingest, retrieve, archive, clear |
//! | [`relevance`] | Relevance classifier |
//! | [`generator`] | Streaming response generator |
//! | [`router`] | Per-query routing |
//! | [`session`] | Chat history and the fallback hand-off |
//! | [`app`] | Component construction |

pub mod app;
pub mod chat_cmd;
pub mod config;
pub mod db;
pub mod document_store;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod relevance;
pub mod router;
pub mod session;
pub mod sqlite_index;
pub mod store_cmd;
