//! Query service: data source + retrieval engine + answer synthesizer.
//!
//! The [`QueryService`] is the one long-lived object of a deployment. It is
//! built once, initialized once, then shared (typically as
//! `Arc<QueryService>`) by every request handler.
//!
//! # Example
//!
//! ```rust,ignore
//! use nlq_rag::{QueryConfig, QueryService};
//!
//! let service = QueryService::builder()
//!     .config(QueryConfig::builder().collection("listings").build()?)
//!     .source(Arc::new(source))
//!     .embedding_provider(Arc::new(embedder))
//!     .synthesizer(Arc::new(synthesizer))
//!     .build()?;
//!
//! service.initialize().await?;
//! let response = service.query("cheap flats near the beach", None).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::QueryConfig;
use crate::embedding::EmbeddingProvider;
use crate::engine::RetrievalEngine;
use crate::error::{NlqError, Result};
use crate::record::SearchResult;
use crate::source::DataSource;
use crate::synthesizer::{AnswerSynthesizer, error_answer};

/// The answer to one natural-language query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    /// The question as asked.
    pub question: String,
    /// The synthesized answer, or an `"Error generating response: ..."` text.
    pub answer: String,
    /// The retrieved records, closest first.
    pub results: Vec<SearchResult>,
}

/// Wires a [`DataSource`], a [`RetrievalEngine`] and an [`AnswerSynthesizer`]
/// into an `initialize` / `query` lifecycle. Construct one via
/// [`QueryService::builder()`].
pub struct QueryService {
    config: QueryConfig,
    source: Arc<dyn DataSource>,
    engine: RetrievalEngine,
    synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl QueryService {
    /// Create a new [`QueryServiceBuilder`].
    pub fn builder() -> QueryServiceBuilder {
        QueryServiceBuilder::default()
    }

    /// Return a reference to the service configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Return a reference to the retrieval engine.
    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// Connect the data source, fetch the configured collection and build the
    /// search index. Returns the number of indexed records.
    ///
    /// # Errors
    ///
    /// - [`NlqError::AdapterError`] if connecting or fetching fails.
    /// - [`NlqError::NoDataFound`] if the fetch yields no records; no index
    ///   build is attempted in that case.
    /// - Any index-build error from [`RetrievalEngine::build_index`].
    pub async fn initialize(&self) -> Result<usize> {
        let collection = &self.config.collection;

        info!(adapter = self.source.name(), "connecting to data source");
        self.source.connect(&self.config.source_config).await.map_err(|e| {
            error!(adapter = self.source.name(), error = %e, "connection failed");
            e
        })?;

        let records = self.source.fetch_data(collection, self.config.filters.as_ref()).await?;
        if records.is_empty() {
            error!(collection = %collection, "data source returned no records");
            return Err(NlqError::NoDataFound { collection: collection.clone() });
        }
        info!(collection = %collection, record_count = records.len(), "loaded records");

        self.engine.build_index(records, &self.config.text_fields).await
    }

    /// Search without synthesizing an answer.
    ///
    /// `num_results` defaults to the configured `default_num_results`.
    pub async fn search(
        &self,
        question: &str,
        num_results: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let k = num_results.unwrap_or(self.config.default_num_results);
        self.engine.search(question, k).await
    }

    /// Answer `question` from the `num_results` most relevant records.
    ///
    /// # Errors
    ///
    /// Only retrieval failures are returned. A failing synthesizer yields a
    /// response whose `answer` describes the failure.
    pub async fn query(&self, question: &str, num_results: Option<usize>) -> Result<QueryResponse> {
        let results = self.search(question, num_results).await?;

        let answer =
            match self.synthesizer.generate(question, &results, &self.config.context).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(
                        synthesizer = self.synthesizer.name(),
                        error = %e,
                        "answer generation failed"
                    );
                    error_answer(&e)
                }
            };

        info!(result_count = results.len(), "query completed");
        Ok(QueryResponse { question: question.to_string(), answer, results })
    }

    /// Close the data-source connection.
    pub async fn close(&self) -> Result<()> {
        self.source.close().await
    }
}

/// Builder for constructing a [`QueryService`].
///
/// All fields are required. Call [`build()`](QueryServiceBuilder::build) to
/// validate and produce the service.
#[derive(Default)]
pub struct QueryServiceBuilder {
    config: Option<QueryConfig>,
    source: Option<Arc<dyn DataSource>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
}

impl QueryServiceBuilder {
    /// Set the service configuration.
    pub fn config(mut self, config: QueryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the data source.
    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the answer synthesizer.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Build the [`QueryService`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`NlqError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<QueryService> {
        let config =
            self.config.ok_or_else(|| NlqError::ConfigError("config is required".to_string()))?;
        let source =
            self.source.ok_or_else(|| NlqError::ConfigError("source is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| NlqError::ConfigError("embedding_provider is required".to_string()))?;
        let synthesizer = self
            .synthesizer
            .ok_or_else(|| NlqError::ConfigError("synthesizer is required".to_string()))?;

        Ok(QueryService {
            config,
            source,
            engine: RetrievalEngine::new(embedding_provider),
            synthesizer,
        })
    }
}
