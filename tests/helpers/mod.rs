#![allow(dead_code)]

use std::sync::Arc;

pub use engram::embedding::testing::FakeEmbedder;
use engram::observation::{NewObservation, ObservationStore, ObservationType};
use engram::vector::SqliteVectorIndex;
use engram::Engram;

pub const DIMS: usize = 32;

pub fn fake_embedder() -> Arc<FakeEmbedder> {
    Arc::new(FakeEmbedder::new(DIMS))
}

pub fn offline_embedder() -> Arc<FakeEmbedder> {
    Arc::new(FakeEmbedder::offline(DIMS))
}

/// An engine over in-memory stores driven by `embedder`.
pub fn test_engram(embedder: Arc<FakeEmbedder>) -> Engram {
    let store = ObservationStore::in_memory().unwrap();
    let vectors = SqliteVectorIndex::in_memory(embedder).unwrap();
    Engram::new(Arc::new(store), Arc::new(vectors))
}

pub fn observation(
    obs_type: ObservationType,
    content: &str,
    project: Option<&str>,
) -> NewObservation {
    let obs = NewObservation::new("s1", obs_type, content);
    match project {
        Some(path) => obs.with_project(path),
        None => obs,
    }
}

/// Save the two observations from the reference scenario. Returns their ids.
pub async fn seed_scenario(engram: &Engram) -> (i64, i64) {
    let first = engram
        .save(observation(
            ObservationType::Decision,
            "use SQLite FTS5 for lexical search",
            Some("/repo/a"),
        ))
        .await
        .unwrap();
    let second = engram
        .save(observation(
            ObservationType::Bugfix,
            "fixed race in vector store",
            Some("/repo/b"),
        ))
        .await
        .unwrap();
    (first.id, second.id)
}
