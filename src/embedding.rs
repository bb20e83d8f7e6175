//! # Embedding provider
//!
//! Turns question text into fixed-length vectors via the Gemini embedding
//! API. The provider is the only component allowed to talk to the embedding
//! backend; everything downstream works with plain `Vec<f32>`.
//!
//! Transport and auth failures surface as [`MistError::Provider`] after at
//! most one immediate retry. There is no backoff at this layer: a failed
//! live query is a user-visible error, not something to queue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::MistError;

/// Public endpoint template for `models/<name>:embedContent`.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Turns text into a fixed-length numeric vector.
///
/// Implementations must return vectors of a single dimensionality across
/// calls. Failures are [`MistError::Provider`] and propagate to the caller;
/// the retrieval engine never papers over a failed live-query embedding.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MistError>;

    /// Dimensionality of every vector produced by this provider.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini embedding client.
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    model: String,
    dimension: usize,
    endpoint: String,
}

impl GeminiEmbedding {
    /// Build a client for `model` producing `dimension`-length vectors.
    pub fn new(api_key: String, model: String, dimension: usize) -> Result<Self, MistError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MistError::Provider(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!("{GEMINI_API_BASE}/models/{model}:embedContent");

        Ok(Self {
            api_key,
            client,
            model,
            dimension,
            endpoint,
        })
    }

    /// Point at a different endpoint (self-hosted proxy, tests).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    async fn request(&self, body: &EmbedRequest) -> Result<Vec<f32>, MistError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| MistError::Provider(format!("embedding request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MistError::Provider(format!("embedding response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(MistError::Provider(format!(
                "embedding endpoint returned {status}: {text}"
            )));
        }

        let parsed: EmbedResponse = serde_json::from_str(&text)
            .map_err(|e| MistError::Provider(format!("unexpected embedding response: {e}")))?;

        Ok(parsed.embedding.values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MistError> {
        // Empty input has no semantic content. The zero vector lets callers
        // treat it as "no match possible" instead of an error.
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let body = EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: "SEMANTIC_SIMILARITY".to_string(),
            output_dimensionality: self.dimension,
        };

        match self.request(&body).await {
            Ok(values) => Ok(values),
            Err(first) => {
                tracing::warn!("embedding request failed, retrying once: {first}");
                self.request(&body).await
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Resolve the embedding API key: explicit config value first, the
/// `GEMINI_API_KEY` environment variable second.
pub fn resolve_api_key(configured: Option<&str>) -> Result<String, MistError> {
    if let Some(key) = configured {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(MistError::Provider(
            "no embedding API key configured; set embedding_api_key or GEMINI_API_KEY".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider(server: &MockServer) -> GeminiEmbedding {
        GeminiEmbedding::new("test-key".to_string(), "gemini-embedding-001".to_string(), 4)
            .unwrap()
            .with_endpoint(server.url("/embed"))
    }

    #[tokio::test]
    async fn embeds_text_via_http() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .header("x-goog-api-key", "test-key");
                then.status(200).json_body(serde_json::json!({
                    "embedding": { "values": [0.1, 0.2, 0.3, 0.4] }
                }));
            })
            .await;

        let values = provider(&server)
            .embed("Where is the library?")
            .await
            .unwrap();
        assert_eq!(values, vec![0.1, 0.2, 0.3, 0.4]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_once_then_fails() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(500).body("backend down");
            })
            .await;

        let err = provider(&server).embed("anything").await.unwrap_err();
        assert!(matches!(err, MistError::Provider(_)));
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn empty_input_embeds_to_zero_vector() {
        let server = MockServer::start_async().await;

        // No mock registered: the request must never leave the process.
        let values = provider(&server).embed("   ").await.unwrap();
        assert_eq!(values, vec![0.0; 4]);
    }

    #[test]
    fn api_key_prefers_configured_value() {
        let key = resolve_api_key(Some("from-config")).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn api_key_rejects_empty_config_without_env() {
        // SAFETY: no other test in this binary reads or writes this
        // environment variable.
        unsafe { std::env::remove_var("GEMINI_API_KEY") };
        let err = resolve_api_key(Some("")).unwrap_err();
        assert!(matches!(err, MistError::Provider(_)));
    }
}
