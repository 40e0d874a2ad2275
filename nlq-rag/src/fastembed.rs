//! Local embedding provider backed by `fastembed`.
//!
//! `fastembed::TextEmbedding` runs ONNX inference synchronously, so the model
//! sits behind a mutex and every call runs on `spawn_blocking`.
//!
//! This module is only available when the `fastembed` feature is enabled.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{NlqError, Result};

/// The model used when none is configured.
pub const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminilml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" | "allminilml12v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        other => Err(NlqError::ConfigError(format!(
            "unknown embedding model '{other}'. Supported: all-minilm-l6-v2, all-minilm-l12-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5"
        ))),
    }
}

/// An [`EmbeddingProvider`] running a sentence-transformer model locally.
pub struct FastEmbedProvider {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load `model_name`, downloading it into `cache_dir` if needed.
    pub fn new(model_name: &str, cache_dir: Option<&str>) -> Result<Self> {
        let model = resolve_model(model_name)?;

        let mut options = fastembed::InitOptions::new(model);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(std::path::PathBuf::from(dir));
        }

        info!(model = model_name, "loading embedding model");
        let mut embedding = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| Self::failure(format!("failed to load model: {e}")))?;

        let dimensions = embedding
            .embed(vec!["dimension check"], None)
            .map_err(|e| Self::failure(format!("failed to measure dimensions: {e}")))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| Self::failure("empty sample embedding".into()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(embedding)),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    fn failure(message: String) -> NlqError {
        NlqError::EmbeddingError { provider: "fastembed".into(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Self::failure("no embedding returned".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = "fastembed", batch_size = texts.len(), "embedding batch");

        let model = Arc::clone(&self.model);
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

        tokio::task::spawn_blocking(move || {
            let mut model =
                model.lock().map_err(|e| Self::failure(format!("model lock poisoned: {e}")))?;
            model.embed(texts, None).map_err(|e| Self::failure(format!("embedding failed: {e}")))
        })
        .await
        .map_err(|e| Self::failure(format!("embedding task failed: {e}")))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.model_name)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
