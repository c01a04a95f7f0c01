//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and an Ollama-backed
//! implementation. The provider is created via [`create_provider`] from
//! configuration and injected into the vector index, so tests can substitute
//! their own.

pub mod ollama;
#[doc(hidden)]
pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for embedding text into vectors.
///
/// Every vector produced by one provider has the same dimensionality. Network
/// and service failures surface as [`Error::ProviderUnavailable`] so callers
/// can fall back to lexical search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Best-effort liveness check: the backend answers and serves [`Self::model`].
    async fn is_available(&self) -> bool;

    /// Identifier of the model producing the vectors.
    fn model(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Currently only `"ollama"` is supported.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "ollama" => {
            let provider = ollama::OllamaEmbedder::from_config(config)?;
            Ok(Arc::new(provider))
        }
        other => Err(Error::Config(format!(
            "unknown embedding provider: {other}. Supported: ollama"
        ))),
    }
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}
