//! Assemble a [`QueryService`] from an [`AppConfig`].

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use nlq_rag::chat::ChatSynthesizer;
use nlq_rag::openai::OpenAIEmbeddingProvider;
use nlq_rag::{AnswerSynthesizer, EmbeddingProvider, QueryService};
use tracing::info;

use crate::config::{AiSettings, AppConfig, EmbeddingSettings};

/// Embedding providers this build can construct.
pub fn available_providers() -> Vec<&'static str> {
    let mut providers = vec!["openai"];
    if cfg!(feature = "fastembed") {
        providers.insert(0, "fastembed");
    }
    providers
}

/// Create the embedding provider named by `settings.provider`.
pub fn embedding_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider.trim().to_ascii_lowercase().as_str() {
        "openai" => {
            let api_key = settings
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .unwrap_or_default();
            let mut provider = OpenAIEmbeddingProvider::new(api_key)
                .context("openai embeddings need embedding.api_key or OPENAI_API_KEY")?;
            if let Some(model) = &settings.model {
                provider = provider.with_model(model);
            }
            if let Some(base_url) = &settings.base_url {
                let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
                provider = provider.with_endpoint(endpoint);
            }
            if let Some(dimensions) = settings.dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Ok(Arc::new(provider))
        }
        #[cfg(feature = "fastembed")]
        "fastembed" => {
            let model = settings.model.as_deref().unwrap_or(nlq_rag::fastembed::DEFAULT_MODEL);
            let provider =
                nlq_rag::fastembed::FastEmbedProvider::new(model, settings.cache_dir.as_deref())?;
            Ok(Arc::new(provider))
        }
        other => bail!(
            "unsupported embedding provider '{other}'. Available providers: {}",
            available_providers().join(", ")
        ),
    }
}

/// Create the chat synthesizer described by `settings`.
pub fn synthesizer(settings: &AiSettings) -> Result<Arc<dyn AnswerSynthesizer>> {
    let mut synthesizer = ChatSynthesizer::new(&settings.api_url)?.with_model(&settings.model);
    if let Some(key) = &settings.api_key {
        synthesizer = synthesizer.with_api_key(key);
    }
    Ok(Arc::new(synthesizer))
}

/// Build an uninitialized service. Call [`QueryService::initialize`] before
/// serving queries.
pub fn build_service(config: &AppConfig) -> Result<Arc<QueryService>> {
    let source = nlq_sources::create_source(&config.database_type)?;
    let embedding = embedding_provider(&config.embedding)?;
    info!(
        database_type = %config.database_type,
        collection = %config.collection,
        embedding = embedding.name(),
        "assembling query service"
    );

    let service = QueryService::builder()
        .config(config.query_config()?)
        .source(source)
        .embedding_provider(embedding)
        .synthesizer(synthesizer(&config.ai)?)
        .build()?;
    Ok(Arc::new(service))
}
