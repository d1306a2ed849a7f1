//! # ragchat core
//!
//! Shared, runtime-agnostic logic for ragchat: the chunk and source data
//! model, the deterministic text splitter, the embedding trait, and the
//! vector index abstraction with an in-memory backend.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod store;
