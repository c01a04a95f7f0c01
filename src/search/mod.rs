//! Hybrid retrieval: lexical BM25 over the observation store plus cosine
//! nearest-neighbour over the vector index, fused into one ranked list.
//!
//! The engine is stateless per query. When the semantic branch cannot be
//! served (provider down, model missing, dimension mismatch, deadline hit) the
//! query is answered lexically and the response says so through
//! [`SearchResponse::degraded`].

pub mod fusion;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observation::{Observation, ObservationStore, ObservationType};
use crate::vector::{VectorFilter, VectorHit, VectorIndex};

// ── Public types ──────────────────────────────────────────────────────────────

/// Which retrieval branches a query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Lexical,
    Hybrid,
}

impl SearchMode {
    pub fn includes_semantic(self) -> bool {
        matches!(self, Self::Semantic | Self::Hybrid)
    }

    pub fn includes_lexical(self) -> bool {
        matches!(self, Self::Lexical | Self::Hybrid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            // "keyword" is the older name for lexical mode
            "lexical" | "keyword" => Ok(Self::Lexical),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Config(format!(
                "unknown search mode: {other}. Expected semantic, lexical or hybrid"
            ))),
        }
    }
}

/// The branch that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Semantic,
    Lexical,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
        })
    }
}

/// One ranked hit, whichever branch it came from.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: i64,
    /// Observation content, or its compressed form when content is blank.
    pub content: String,
    #[serde(rename = "type")]
    pub obs_type: ObservationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    /// Higher is better. Semantic and lexical scores use different scales.
    pub score: f64,
    pub source: Source,
}

impl SearchResult {
    fn lexical(observation: Observation, score: f64) -> Self {
        Self {
            id: observation.id,
            content: observation.display_text().to_string(),
            obs_type: observation.obs_type,
            project_path: observation.project_path,
            score,
            source: Source::Lexical,
        }
    }

    fn semantic(hit: VectorHit, content: String) -> Self {
        Self {
            id: hit.id,
            content,
            obs_type: hit.metadata.obs_type.into(),
            project_path: hit.metadata.project_path,
            score: 1.0 - hit.distance,
            source: Source::Semantic,
        }
    }

    /// Short project name for display, e.g. `engram` for `/home/me/src/engram`.
    pub fn project_label(&self) -> Option<String> {
        self.project_path.as_deref().map(crate::project::project_name)
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub mode: SearchMode,
    /// Only return observations whose `project_path` equals this.
    pub project_filter: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            limit,
            mode,
            project_filter: None,
        }
    }

    pub fn with_project(mut self, project_path: impl Into<String>) -> Self {
        self.project_filter = Some(project_path.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub requested_mode: SearchMode,
    /// The branches that actually answered.
    pub effective_mode: SearchMode,
    /// Semantic search was requested but could not be served.
    pub degraded: bool,
}

impl SearchResponse {
    fn empty(mode: SearchMode) -> Self {
        Self {
            results: Vec::new(),
            requested_mode: mode,
            effective_mode: mode,
            degraded: false,
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Per-query orchestration over the two stores.
pub struct HybridSearch<'a> {
    store: &'a ObservationStore,
    vectors: &'a dyn VectorIndex,
    semantic_timeout: Option<Duration>,
}

impl<'a> HybridSearch<'a> {
    pub fn new(store: &'a ObservationStore, vectors: &'a dyn VectorIndex) -> Self {
        Self {
            store,
            vectors,
            semantic_timeout: None,
        }
    }

    /// Abandon the semantic branch after `timeout` and answer lexically.
    pub fn with_semantic_timeout(mut self, timeout: Duration) -> Self {
        self.semantic_timeout = Some(timeout);
        self
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut response = SearchResponse::empty(request.mode);
        if request.limit == 0 || request.query.trim().is_empty() {
            return Ok(response);
        }

        let mut mode = request.mode;

        // Semantic results go first so they win score ties
        let mut results = Vec::new();
        if mode.includes_semantic() {
            match self.semantic(request).await {
                Ok(hits) => results.extend(hits),
                Err(e) if e.is_semantic_unavailable() => {
                    tracing::warn!(
                        requested = %request.mode,
                        error = %e,
                        "semantic search unavailable, using lexical only"
                    );
                    mode = SearchMode::Lexical;
                }
                Err(e) => return Err(e),
            }
        }

        if mode.includes_lexical() {
            results.extend(self.lexical(request)?);
        }

        if mode == SearchMode::Hybrid {
            results = fusion::merge_by_id(results);
        }

        response.results = fusion::rank(results, request.limit);
        response.effective_mode = mode;
        response.degraded = mode != request.mode;

        tracing::debug!(
            query = %request.query,
            mode = %mode,
            results = response.results.len(),
            "search complete"
        );
        Ok(response)
    }

    async fn semantic(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        // One deadline covers the readiness check and the search
        let pending = self.nearest(request);
        let hits = match self.semantic_timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| {
                    Error::ProviderUnavailable(format!(
                        "semantic search timed out after {}s",
                        timeout.as_secs_f64()
                    ))
                })??,
            None => pending.await?,
        };

        hits.into_iter()
            .map(|mut hit| -> Result<SearchResult> {
                let content = match hit.content.take() {
                    Some(content) => content,
                    None => self
                        .store
                        .get(hit.id)?
                        .map(|obs| obs.display_text().to_string())
                        .unwrap_or_default(),
                };
                Ok(SearchResult::semantic(hit, content))
            })
            .collect()
    }

    async fn nearest(&self, request: &SearchRequest) -> Result<Vec<VectorHit>> {
        if !self.vectors.is_ready().await {
            return Err(Error::ProviderUnavailable("vector index is not ready".into()));
        }
        let filter = request
            .project_filter
            .as_deref()
            .map(VectorFilter::project)
            .unwrap_or_default();
        self.vectors.search(&request.query, request.limit, &filter).await
    }

    fn lexical(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let results = self.store.lexical_search(
            &request.query,
            request.limit,
            request.project_filter.as_deref(),
        )?;
        Ok(results
            .into_iter()
            .map(|(obs, score)| SearchResult::lexical(obs, score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::testing::FakeEmbedder;
    use crate::observation::NewObservation;
    use crate::vector::{SqliteVectorIndex, VectorMetadata};

    /// Index whose every search fails or stalls. Readiness answers yes,
    /// possibly after `ready_stall`.
    struct BrokenIndex {
        stall: Option<Duration>,
        ready_stall: Option<Duration>,
        error: fn() -> Error,
    }

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        async fn is_ready(&self) -> bool {
            if let Some(stall) = self.ready_stall {
                tokio::time::sleep(stall).await;
            }
            true
        }

        async fn add(&self, _id: i64, _content: &str, _metadata: &VectorMetadata) -> Result<()> {
            Err((self.error)())
        }

        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _filter: &VectorFilter,
        ) -> Result<Vec<VectorHit>> {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            Err((self.error)())
        }

        fn delete(&self, _id: i64) -> Result<()> {
            Ok(())
        }

        fn count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    fn provider_down() -> Error {
        Error::ProviderUnavailable("connection refused".into())
    }

    fn corrupt() -> Error {
        Error::LockPoisoned
    }

    async fn seeded() -> (ObservationStore, SqliteVectorIndex) {
        let store = ObservationStore::in_memory().unwrap();
        let vectors = SqliteVectorIndex::in_memory(Arc::new(FakeEmbedder::new(32))).unwrap();
        for (content, project) in [
            ("use SQLite FTS5 for lexical search", "/repo/a"),
            ("fixed race in vector store", "/repo/b"),
            ("vector store uses cosine distance", "/repo/a"),
        ] {
            let obs = NewObservation::new("s1", ObservationType::Decision, content).with_project(project);
            let id = store.insert(&obs).unwrap();
            let metadata = VectorMetadata {
                obs_type: obs.obs_type.to_string(),
                session_id: obs.session_id.clone(),
                project_path: obs.project_path.clone(),
            };
            vectors.add(id, content, &metadata).await.unwrap();
        }
        (store, vectors)
    }

    #[test]
    fn parse_modes() {
        assert_eq!("semantic".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Lexical);
        assert_eq!("Hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        let err = "fuzzy".parse::<SearchMode>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn hybrid_combines_both_sources() {
        let (store, vectors) = seeded().await;
        let engine = HybridSearch::new(&store, &vectors);

        let response = engine
            .search(&SearchRequest::new("vector store", 10, SearchMode::Hybrid))
            .await
            .unwrap();

        assert!(!response.degraded);
        assert_eq!(response.effective_mode, SearchMode::Hybrid);
        let mut ids: Vec<i64> = response.results.iter().map(|r| r.id).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total, "hybrid results must not repeat ids");
        for pair in response.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn semantic_scores_are_similarities() {
        let (store, vectors) = seeded().await;
        let engine = HybridSearch::new(&store, &vectors);

        let response = engine
            .search(&SearchRequest::new("fixed race in vector store", 3, SearchMode::Semantic))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 3);
        let top = &response.results[0];
        assert_eq!(top.content, "fixed race in vector store");
        assert_eq!(top.source, Source::Semantic);
        assert!((top.score - 1.0).abs() < 1e-5);
        assert!(response.results.iter().all(|r| (-1.0..=1.0 + 1e-6).contains(&r.score)));
    }

    #[tokio::test]
    async fn failing_semantic_branch_degrades() {
        let (store, _) = seeded().await;
        let broken = BrokenIndex {
            stall: None,
            ready_stall: None,
            error: provider_down,
        };
        let engine = HybridSearch::new(&store, &broken);

        let response = engine
            .search(&SearchRequest::new("SQLite", 5, SearchMode::Hybrid))
            .await
            .unwrap();
        assert!(response.degraded);
        assert_eq!(response.effective_mode, SearchMode::Lexical);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].source, Source::Lexical);
    }

    #[tokio::test]
    async fn stalled_semantic_branch_times_out() {
        let (store, _) = seeded().await;
        let stalled = BrokenIndex {
            stall: Some(Duration::from_secs(30)),
            ready_stall: None,
            error: provider_down,
        };
        let engine =
            HybridSearch::new(&store, &stalled).with_semantic_timeout(Duration::from_millis(50));

        let response = engine
            .search(&SearchRequest::new("SQLite", 5, SearchMode::Semantic))
            .await
            .unwrap();
        assert!(response.degraded);
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn stalled_readiness_check_shares_the_deadline() {
        let (store, _) = seeded().await;
        let hanging = BrokenIndex {
            stall: None,
            ready_stall: Some(Duration::from_secs(3)),
            error: provider_down,
        };
        let engine =
            HybridSearch::new(&store, &hanging).with_semantic_timeout(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let response = engine
            .search(&SearchRequest::new("SQLite", 5, SearchMode::Hybrid))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
        assert!(response.degraded);
        assert_eq!(response.effective_mode, SearchMode::Lexical);
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_in_semantic_branch_propagates() {
        let (store, _) = seeded().await;
        let broken = BrokenIndex {
            stall: None,
            ready_stall: None,
            error: corrupt,
        };
        let engine = HybridSearch::new(&store, &broken);

        let err = engine
            .search(&SearchRequest::new("SQLite", 5, SearchMode::Hybrid))
            .await
            .unwrap_err();
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn blank_query_and_zero_limit_are_empty() {
        let (store, vectors) = seeded().await;
        let engine = HybridSearch::new(&store, &vectors);

        let response = engine
            .search(&SearchRequest::new("   ", 5, SearchMode::Hybrid))
            .await
            .unwrap();
        assert!(response.results.is_empty());

        let response = engine
            .search(&SearchRequest::new("vector", 0, SearchMode::Hybrid))
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert!(!response.degraded);
    }

    #[test]
    fn project_label_is_last_component() {
        let result = SearchResult {
            id: 1,
            content: String::new(),
            obs_type: ObservationType::Change,
            project_path: Some("/home/dev/src/engram".into()),
            score: 1.0,
            source: Source::Lexical,
        };
        assert_eq!(result.project_label().as_deref(), Some("engram"));
    }
}
