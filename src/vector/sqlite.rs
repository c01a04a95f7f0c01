//! sqlite-vec backed vector index.
//!
//! Vectors live in their own database file next to the observation store.
//! Ranking uses sqlite-vec's `vec_distance_cosine`, which keeps metadata
//! filters exact: the filter is applied before the neighbours are ranked, not
//! after a fixed-size candidate pool is cut.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{VectorFilter, VectorHit, VectorIndex, VectorMetadata};
use crate::db;
use crate::db::migrations::{get_meta, set_meta};
use crate::embedding::{embedding_to_bytes, EmbeddingProvider};
use crate::error::{Error, Result};

const DIMENSIONS_KEY: &str = "embedding_dimensions";
const MODEL_KEY: &str = "embedding_model";

pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteVectorIndex {
    pub fn open(path: impl AsRef<Path>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Ok(Self::from_connection(db::open_vector_db(path)?, embedder))
    }

    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let conn = db::open_in_memory()?;
        db::prepare_vector_db(&conn)?;
        Ok(Self::from_connection(conn, embedder))
    }

    fn from_connection(conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            conn: Mutex::new(conn),
            embedder,
        }
    }

    /// Model that produced the stored vectors, recorded on first write.
    pub fn stored_model(&self) -> Result<Option<String>> {
        let conn = self.conn.lock()?;
        Ok(get_meta(&conn, MODEL_KEY)?)
    }

    /// Dimensionality shared by every stored vector, if any have been written.
    pub fn dimensions(&self) -> Result<Option<usize>> {
        let conn = self.conn.lock()?;
        stored_dimensions(&conn)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn is_ready(&self) -> bool {
        self.embedder.is_available().await
    }

    async fn add(&self, id: i64, content: &str, metadata: &VectorMetadata) -> Result<()> {
        let embedding = self.embedder.embed(content).await?;

        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;

        claim_dimensions(&tx, embedding.len(), self.embedder.model())?;

        tx.execute(
            "INSERT OR REPLACE INTO vectors \
             (observation_id, embedding, content, type, session_id, project_path, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                embedding_to_bytes(&embedding),
                content,
                metadata.obs_type,
                metadata.session_id,
                metadata.project_path,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(id, dimensions = embedding.len(), "vector stored");
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;

        let conn = self.conn.lock()?;
        match stored_dimensions(&conn)? {
            // Nothing has been written yet
            None => return Ok(Vec::new()),
            Some(expected) if expected != embedding.len() => {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
        }

        let mut stmt = conn.prepare(
            "SELECT observation_id, content, type, session_id, project_path, distance FROM ( \
                 SELECT observation_id, content, type, session_id, project_path, \
                        vec_distance_cosine(embedding, ?1) AS distance \
                 FROM vectors \
                 WHERE (?2 IS NULL OR project_path = ?2) \
                   AND (?3 IS NULL OR session_id = ?3) \
                   AND (?4 IS NULL OR type = ?4) \
             ) \
             WHERE distance IS NOT NULL \
             ORDER BY distance LIMIT ?5",
        )?;

        let hits = stmt
            .query_map(
                params![
                    embedding_to_bytes(&embedding),
                    filter.project_path,
                    filter.session_id,
                    filter.obs_type,
                    limit as i64,
                ],
                |row| {
                    Ok(VectorHit {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        metadata: VectorMetadata {
                            obs_type: row.get(2)?,
                            session_id: row.get(3)?,
                            project_path: row.get(4)?,
                        },
                        distance: row.get(5)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(hits)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock()?;
        conn.execute("DELETE FROM vectors WHERE observation_id = ?1", params![id])?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn stored_dimensions(conn: &Connection) -> Result<Option<usize>> {
    Ok(get_meta(conn, DIMENSIONS_KEY)?.and_then(|v| v.parse().ok()))
}

/// The first vector written fixes the index dimensionality; later vectors must match.
fn claim_dimensions(conn: &Connection, actual: usize, model: &str) -> Result<()> {
    match stored_dimensions(conn)? {
        Some(expected) if expected != actual => Err(Error::DimensionMismatch { expected, actual }),
        Some(_) => Ok(()),
        None => {
            set_meta(conn, DIMENSIONS_KEY, &actual.to_string())?;
            set_meta(conn, MODEL_KEY, model)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::FakeEmbedder;

    fn index_with(embedder: Arc<FakeEmbedder>) -> SqliteVectorIndex {
        SqliteVectorIndex::in_memory(embedder).unwrap()
    }

    fn meta(project: &str) -> VectorMetadata {
        VectorMetadata {
            obs_type: "decision".into(),
            session_id: "s1".into(),
            project_path: Some(project.into()),
        }
    }

    #[tokio::test]
    async fn test_add_and_search_nearest() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        index.add(1, "sqlite full text search", &meta("/repo/a")).await.unwrap();
        index.add(2, "vector store race condition", &meta("/repo/a")).await.unwrap();

        let hits = index
            .search("race in the vector store", 10, &VectorFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 2);
        assert!(hits[0].distance <= hits[1].distance);
        assert!((0.0..=2.0).contains(&hits[0].distance));
        assert_eq!(hits[0].content.as_deref(), Some("vector store race condition"));
        assert_eq!(hits[0].metadata, meta("/repo/a"));
        assert_eq!(index.stored_model().unwrap().as_deref(), Some("fake-embedder"));
        assert_eq!(index.dimensions().unwrap(), Some(32));
    }

    #[tokio::test]
    async fn test_identical_text_has_zero_distance() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        index.add(7, "deploy on friday", &meta("/repo/a")).await.unwrap();

        let hits = index
            .search("deploy on friday", 1, &VectorFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].id, 7);
        assert!(hits[0].distance.abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_applies_project_filter() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        index.add(1, "vector store", &meta("/repo/a")).await.unwrap();
        index.add(2, "vector store", &meta("/repo/b")).await.unwrap();

        let hits = index
            .search("vector store", 10, &VectorFilter::project("/repo/b"))
            .await
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_search_filters_on_session_and_type() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        index.add(1, "cache layer", &meta("/repo/a")).await.unwrap();
        let other = VectorMetadata {
            obs_type: "bugfix".into(),
            session_id: "s2".into(),
            project_path: None,
        };
        index.add(2, "cache layer", &other).await.unwrap();

        let by_session = VectorFilter {
            session_id: Some("s2".into()),
            ..VectorFilter::default()
        };
        let hits = index.search("cache", 10, &by_session).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2]);

        let by_type = VectorFilter {
            obs_type: Some("decision".into()),
            ..VectorFilter::default()
        };
        let hits = index.search("cache", 10, &by_type).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_index_and_zero_limit() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        assert!(index
            .search("anything", 5, &VectorFilter::default())
            .await
            .unwrap()
            .is_empty());

        index.add(1, "anything", &meta("/repo/a")).await.unwrap();
        assert!(index
            .search("anything", 0, &VectorFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_add_replaces_existing_entry() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        index.add(1, "first text", &meta("/repo/a")).await.unwrap();
        index.add(1, "second text", &meta("/repo/a")).await.unwrap();
        assert_eq!(index.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        index.add(1, "one", &meta("/repo/a")).await.unwrap();
        index.add(2, "two", &meta("/repo/a")).await.unwrap();
        assert_eq!(index.count().unwrap(), 2);

        index.delete(1).unwrap();
        index.delete(99).unwrap(); // missing id is a no-op
        assert_eq!(index.count().unwrap(), 1);

        let hits = index.search("one", 10, &VectorFilter::default()).await.unwrap();
        assert!(hits.iter().all(|h| h.id != 1));
    }

    #[tokio::test]
    async fn test_unavailable_provider_writes_nothing() {
        let index = index_with(Arc::new(FakeEmbedder::offline(32)));
        assert!(!index.is_ready().await);

        let err = index.add(1, "lost", &meta("/repo/a")).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
        assert_eq!(index.count().unwrap(), 0);

        let err = index
            .search("lost", 5, &VectorFilter::default())
            .await
            .unwrap_err();
        assert!(err.is_semantic_unavailable());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = index_with(Arc::new(FakeEmbedder::new(32)));
        {
            let conn = index.conn.lock().unwrap();
            set_meta(&conn, DIMENSIONS_KEY, "1024").unwrap();
        }

        let err = index.add(1, "text", &meta("/repo/a")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 1024,
                actual: 32
            }
        ));
        assert!(err.is_semantic_unavailable());

        let err = index
            .search("text", 5, &VectorFilter::default())
            .await
            .unwrap_err();
        assert!(err.is_semantic_unavailable());
    }

    #[tokio::test]
    async fn test_vectors_survive_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vectors.db");
        let embedder = Arc::new(FakeEmbedder::new(32));

        {
            let index = SqliteVectorIndex::open(&path, embedder.clone()).unwrap();
            index.add(5, "persisted note", &meta("/repo/a")).await.unwrap();
        }

        let index = SqliteVectorIndex::open(&path, embedder).unwrap();
        assert_eq!(index.count().unwrap(), 1);
        let hits = index
            .search("persisted note", 1, &VectorFilter::default())
            .await
            .unwrap();
        assert_eq!(hits[0].id, 5);
    }
}
