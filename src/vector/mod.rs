//! Vector index abstraction.
//!
//! [`VectorIndex`] is a capability interface: embed-on-write and
//! nearest-neighbour-on-read under cosine distance. The engine never depends
//! on how the neighbours are found. [`sqlite::SqliteVectorIndex`] is the
//! on-disk implementation.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use sqlite::SqliteVectorIndex;

/// Snapshot of observation fields captured when the vector is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    #[serde(rename = "type")]
    pub obs_type: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

/// Exact-match restrictions applied to a vector search. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub project_path: Option<String>,
    pub session_id: Option<String>,
    pub obs_type: Option<String>,
}

impl VectorFilter {
    pub fn project(project_path: impl Into<String>) -> Self {
        Self {
            project_path: Some(project_path.into()),
            ..Self::default()
        }
    }
}

/// One nearest-neighbour match.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: i64,
    /// The text that was embedded, if the index keeps it.
    pub content: Option<String>,
    pub metadata: VectorMetadata,
    /// Cosine distance in `[0, 2]`; 0 means identical direction.
    pub distance: f64,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether the embedding backend is reachable and serving its model right
    /// now. Advisory only: `add` and `search` can still fail afterwards.
    async fn is_ready(&self) -> bool;

    /// Embed `content` and store it under `id`, replacing any previous entry.
    async fn add(&self, id: i64, content: &str, metadata: &VectorMetadata) -> Result<()>;

    /// Embed `query` and return up to `limit` nearest entries matching `filter`,
    /// closest first.
    async fn search(&self, query: &str, limit: usize, filter: &VectorFilter)
        -> Result<Vec<VectorHit>>;

    /// Remove the entry for `id`. Missing ids are a no-op.
    fn delete(&self, id: i64) -> Result<()>;

    fn count(&self) -> Result<usize>;
}
