//! The engram facade: ingestion, retrieval, and housekeeping over both stores.
//!
//! Writes are two-stage. The observation is committed first; the vector entry
//! follows only if the embedding provider is ready. A crash in between leaves
//! an observation without a vector, which search tolerates.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::EngramConfig;
use crate::embedding;
use crate::error::Result;
use crate::observation::{NewObservation, ObservationStore};
use crate::search::{HybridSearch, SearchRequest, SearchResponse};
use crate::vector::{SqliteVectorIndex, VectorIndex, VectorMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub id: i64,
    /// A vector entry was written alongside the observation.
    pub embedded: bool,
}

/// Result of a best-effort capture. Never an error; callers may ignore it.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Saved(SaveOutcome),
    Failed(String),
}

impl CaptureOutcome {
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Saved(outcome) => Some(outcome.id),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub observations: usize,
    pub sessions: usize,
    pub vectors: usize,
    pub semantic_ready: bool,
}

pub struct Engram {
    store: Arc<ObservationStore>,
    vectors: Arc<dyn VectorIndex>,
    semantic_timeout: Option<Duration>,
}

impl Engram {
    pub fn new(store: Arc<ObservationStore>, vectors: Arc<dyn VectorIndex>) -> Self {
        Self {
            store,
            vectors,
            semantic_timeout: None,
        }
    }

    pub fn with_semantic_timeout(mut self, timeout: Duration) -> Self {
        self.semantic_timeout = Some(timeout);
        self
    }

    /// Open both on-disk stores under the configured data directory, creating
    /// them on first use.
    pub fn open(config: &EngramConfig) -> Result<Self> {
        let provider = embedding::create_provider(&config.embedding)?;
        let store = ObservationStore::open(config.observation_db_path())?;
        let vectors = SqliteVectorIndex::open(config.vector_db_path(), provider.clone())?;

        if let Some(stored) = vectors.stored_model()? {
            if stored != provider.model() {
                tracing::warn!(
                    stored = %stored,
                    configured = %provider.model(),
                    "vector index was built with a different embedding model"
                );
            }
        }

        Ok(Self::new(Arc::new(store), Arc::new(vectors))
            .with_semantic_timeout(config.retrieval.semantic_timeout()))
    }

    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    pub fn vectors(&self) -> &dyn VectorIndex {
        self.vectors.as_ref()
    }

    /// Store an observation, then embed it if the provider is ready.
    ///
    /// Provider failures only cost the vector entry. Storage failures in
    /// either store are returned.
    pub async fn save(&self, obs: NewObservation) -> Result<SaveOutcome> {
        let id = self.store.insert(&obs)?;
        let embedded = self.embed(id, &obs).await?;
        Ok(SaveOutcome { id, embedded })
    }

    async fn embed(&self, id: i64, obs: &NewObservation) -> Result<bool> {
        if !self.vectors.is_ready().await {
            tracing::warn!(id, "embedding provider not ready, stored without vector");
            return Ok(false);
        }

        let metadata = VectorMetadata {
            obs_type: obs.obs_type.to_string(),
            session_id: obs.session_id.clone(),
            project_path: obs.project_path.clone(),
        };

        match self.vectors.add(id, obs.display_text(), &metadata).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_semantic_unavailable() => {
                tracing::warn!(id, error = %e, "embedding failed, stored without vector");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// [`Self::save`] for automated hooks: failures are logged and folded
    /// into the outcome.
    pub async fn capture(&self, obs: NewObservation) -> CaptureOutcome {
        match self.save(obs).await {
            Ok(outcome) => CaptureOutcome::Saved(outcome),
            Err(e) => {
                tracing::debug!(error = %e, "capture dropped");
                CaptureOutcome::Failed(e.to_string())
            }
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut engine = HybridSearch::new(&self.store, self.vectors.as_ref());
        if let Some(timeout) = self.semantic_timeout {
            engine = engine.with_semantic_timeout(timeout);
        }
        engine.search(request).await
    }

    pub async fn semantic_ready(&self) -> bool {
        self.vectors.is_ready().await
    }

    /// Purge an observation from both stores. Returns `false` if it did not exist.
    pub fn forget(&self, id: i64) -> Result<bool> {
        // Vector entry first so it never outlives its observation
        self.vectors.delete(id)?;
        self.store.delete(id)
    }

    pub fn end_session(&self, session_id: &str, summary: Option<&str>) -> Result<bool> {
        self.store.end_session(session_id, summary)
    }

    pub async fn status(&self) -> Result<Status> {
        Ok(Status {
            observations: self.store.count()?,
            sessions: self.store.count_sessions()?,
            vectors: self.vectors.count()?,
            semantic_ready: self.vectors.is_ready().await,
        })
    }
}
