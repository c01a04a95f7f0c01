//! Ollama HTTP embedding provider.
//!
//! Talks to a local Ollama daemon: `POST /api/embeddings` to embed,
//! `GET /api/tags` to check for the model, `POST /api/pull` to fetch it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Embedding provider backed by an Ollama daemon.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    pull_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaEmbedder {
    /// Build an embedder with an owned client whose requests time out after `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            pull_timeout: Duration::from_secs(300),
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(&config.base_url, &config.model, config.timeout())?
            .with_pull_timeout(config.pull_timeout()))
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the daemon to download the model. Blocks until the pull finishes
    /// or the pull timeout elapses.
    pub async fn pull_model(&self) -> Result<()> {
        tracing::info!(model = %self.model, "pulling embedding model");
        self.client
            .post(format!("{}/api/pull", self.base_url))
            .timeout(self.pull_timeout)
            .json(&json!({ "name": self.model, "stream": false }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| unavailable("model pull failed", e))?;
        tracing::info!(model = %self.model, "embedding model pulled");
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| unavailable("model listing failed", e))?
            .json()
            .await
            .map_err(|e| unavailable("malformed model listing", e))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbeddingResponse = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| unavailable("embedding request failed", e))?
            .json()
            .await
            .map_err(|e| unavailable("malformed embedding response", e))?;

        if response.embedding.is_empty() {
            return Err(Error::ProviderUnavailable(format!(
                "model {} returned an empty embedding",
                self.model
            )));
        }

        tracing::debug!(dimensions = response.embedding.len(), "generated embedding");
        Ok(response.embedding)
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => models.iter().any(|name| name.contains(&self.model)),
            Err(e) => {
                tracing::debug!(error = %e, "embedding provider check failed");
                false
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn unavailable(what: &str, err: reqwest::Error) -> Error {
    Error::ProviderUnavailable(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> OllamaEmbedder {
        OllamaEmbedder::new(server.uri(), "bge-m3", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn embed_posts_model_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({ "model": "bge-m3", "prompt": "hello" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.5, -0.25, 1.0] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let embedding = embedder(&server).embed("hello").await.unwrap();
        assert_eq!(embedding, vec![0.5, -0.25, 1.0]);
    }

    #[tokio::test]
    async fn server_error_is_provider_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = embedder(&server).embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)), "{err}");
    }

    #[tokio::test]
    async fn empty_embedding_is_provider_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [] })))
            .mount(&server)
            .await;

        let err = embedder(&server).embed("hello").await.unwrap_err();
        assert!(err.is_semantic_unavailable());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embedding": [1.0] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let embedder =
            OllamaEmbedder::new(server.uri(), "bge-m3", Duration::from_millis(100)).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn available_when_model_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{ "name": "llama3:latest" }, { "name": "bge-m3:latest" }]
            })))
            .mount(&server)
            .await;

        assert!(embedder(&server).is_available().await);
    }

    #[tokio::test]
    async fn unavailable_when_model_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "models": [{ "name": "llama3:latest" }] })),
            )
            .mount(&server)
            .await;

        assert!(!embedder(&server).is_available().await);
    }

    #[tokio::test]
    async fn unreachable_daemon_is_unavailable() {
        let embedder =
            OllamaEmbedder::new("http://127.0.0.1:9", "bge-m3", Duration::from_secs(1)).unwrap();
        assert!(!embedder.is_available().await);
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(err.is_semantic_unavailable());
    }

    #[tokio::test]
    async fn pull_model_posts_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .and(body_partial_json(json!({ "name": "bge-m3", "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
            .expect(1)
            .mount(&server)
            .await;

        embedder(&server).pull_model().await.unwrap();
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let embedder =
            OllamaEmbedder::new("http://localhost:11434/", "bge-m3", Duration::from_secs(1))
                .unwrap();
        assert_eq!(embedder.base_url(), "http://localhost:11434");
    }
}
