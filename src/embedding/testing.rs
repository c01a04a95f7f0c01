//! Deterministic embedder shared by the unit and integration tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::error::{Error, Result};

/// Bag-of-words embedder. Texts sharing words point in similar directions;
/// identical texts embed identically.
pub struct FakeEmbedder {
    dims: usize,
    available: AtomicBool,
    fail_embed: AtomicBool,
    embed_delay_ms: AtomicU64,
    ready_delay_ms: AtomicU64,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            available: AtomicBool::new(true),
            fail_embed: AtomicBool::new(false),
            embed_delay_ms: AtomicU64::new(0),
            ready_delay_ms: AtomicU64::new(0),
        }
    }

    /// Readiness check says unavailable and every embed fails.
    pub fn offline(dims: usize) -> Self {
        let embedder = Self::new(dims);
        embedder.set_available(false);
        embedder
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Readiness still succeeds but embed calls fail, as when the daemon dies
    /// between the readiness check and the request.
    pub fn set_fail_embed(&self, fail: bool) {
        self.fail_embed.store(fail, Ordering::SeqCst);
    }

    /// Stall every embed call.
    pub fn set_delay(&self, delay: Duration) {
        self.embed_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stall every readiness check, like a daemon that accepts the connection
    /// and never answers.
    pub fn set_ready_delay(&self, delay: Duration) {
        self.ready_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

/// Each word lands in one bucket; slot 0 carries a small bias so the vector
/// is never all zeros.
pub fn vectorize(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    v[0] = 0.1;
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let slot = 1 + (hasher.finish() as usize) % (dims - 1);
        v[slot] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}

async fn stall(millis: &AtomicU64) {
    let delay = millis.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        stall(&self.embed_delay_ms).await;
        if !self.available.load(Ordering::SeqCst) || self.fail_embed.load(Ordering::SeqCst) {
            return Err(Error::ProviderUnavailable("fake embedder offline".into()));
        }
        Ok(vectorize(text, self.dims))
    }

    async fn is_available(&self) -> bool {
        stall(&self.ready_delay_ms).await;
        self.available.load(Ordering::SeqCst)
    }

    fn model(&self) -> &str {
        "fake-embedder"
    }
}
