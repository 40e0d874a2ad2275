//! Embeddings from an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{NlqError, Result};

pub const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Output size of [`DEFAULT_MODEL`].
const DEFAULT_DIMENSIONS: usize = 1536;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const PROVIDER: &str = "openai";

/// An [`EmbeddingProvider`] posting batches to an OpenAI-compatible API.
///
/// The whole corpus goes out as one request, so a single build sees one
/// model version and one normalization.
///
/// ```rust,ignore
/// use nlq_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?
///     .with_endpoint("http://localhost:11434/v1/embeddings")
///     .with_model("nomic-embed-text")
///     .with_dimensions(768);
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
    /// Sent as `dimensions` when the caller asked for truncated vectors.
    requested_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(failure("API key must not be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| failure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: OPENAI_EMBEDDINGS_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            requested_dimensions: None,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use another server's embeddings URL (full path, not a base URL).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Ask the API for `dims`-long vectors and report that size.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.requested_dimensions = Some(dims);
        self
    }
}

fn failure(message: impl Into<String>) -> NlqError {
    NlqError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct BatchResponse {
    data: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// `error.message` from an error body, or the body itself.
fn error_detail(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body)
}

/// Vectors in input order; servers may return `data` shuffled.
fn into_input_order(mut items: Vec<Item>) -> Vec<Vec<f32>> {
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }
    items.into_iter().map(|item| item.embedding).collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| failure("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch_size = texts.len(), "requesting embeddings");

        let body =
            BatchRequest { model: &self.model, input: texts, dimensions: self.requested_dimensions };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(%status, model = %self.model, "embedding request rejected");
            return Err(failure(format!("HTTP {status}: {detail}")));
        }

        let parsed: BatchResponse =
            response.json().await.map_err(|e| failure(format!("invalid response body: {e}")))?;
        let vectors = into_input_order(parsed.data);
        if vectors.len() != texts.len() {
            return Err(failure(format!(
                "sent {} inputs, received {} embeddings",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new("  "),
            Err(NlqError::EmbeddingError { .. })
        ));
    }

    #[test]
    fn requested_dimensions_are_reported() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_dimensions(256);
        assert_eq!(provider.dimensions(), 256);
        assert_eq!(provider.requested_dimensions, Some(256));
    }

    #[test]
    fn shuffled_items_are_restored_to_input_order() {
        let body = r#"{"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]}"#;
        let parsed: BatchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(into_input_order(parsed.data), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn error_detail_prefers_the_api_message() {
        let body = r#"{"error": {"message": "invalid model", "type": "invalid_request_error"}}"#;
        assert_eq!(error_detail(body.to_string()), "invalid model");
        assert_eq!(error_detail("gateway timeout".to_string()), "gateway timeout");
    }
}
