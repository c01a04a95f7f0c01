//! Personal memory for coding sessions: short observations (decisions,
//! bugfixes, discoveries) tagged by session and project, retrieved by hybrid
//! lexical and semantic search.
//!
//! # Architecture
//!
//! - **Observation store**: SQLite with an FTS5 index kept in the same
//!   transaction as every write, so keyword search is always consistent
//! - **Vector index**: a second SQLite file with
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) ranking by cosine
//!   distance
//! - **Embeddings**: a local [Ollama](https://ollama.com) daemon (`bge-m3` by default)
//! - **Search**: both branches fused by observation id, degrading to lexical
//!   only when the embedding backend is unavailable
//!
//! Vector entries are optional. An observation saved while the embedding
//! backend is down is still found by lexical search, and is never backfilled.
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML and environment variables
//! - [`db`]: connection setup, schema, and migrations for both SQLite files
//! - [`embedding`]: the [`embedding::EmbeddingProvider`] trait and the Ollama client
//! - [`observation`]: observation types and the lexical store
//! - [`vector`]: the [`vector::VectorIndex`] trait and its sqlite-vec implementation
//! - [`search`]: the hybrid retrieval engine and score fusion
//! - [`service`]: the [`Engram`] facade used by the CLI and hooks
//! - [`project`]: project root detection

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod observation;
pub mod project;
pub mod search;
pub mod service;
pub mod vector;

pub use error::{Error, Result};
pub use service::Engram;
