//! Error taxonomy shared by the stores, the vector index, and the search engine.
//!
//! Library-level failures (SQLite, I/O, HTTP) are folded into [`Error`] before
//! they cross a component boundary. Callers branch on
//! [`Error::is_semantic_unavailable`] to decide whether to degrade to lexical
//! search instead of failing.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing SQLite store failed or is corrupt.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage failure: database lock poisoned")]
    LockPoisoned,

    #[error("storage failure: malformed stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The embedding backend is unreachable, missing its model, or timed out.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The vector index was built with a different embedding dimensionality.
    #[error("embedding dimension mismatch: index holds {expected}-dim vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// `true` when semantic search cannot be served right now but lexical search
    /// is unaffected.
    pub fn is_semantic_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::DimensionMismatch { .. }
        )
    }

    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Io(_) | Self::LockPoisoned | Self::Serialization(_)
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
