//! Retrieval engine: projection → embedding → indexing, and back again.
//!
//! The [`RetrievalEngine`] owns the current index generation: the
//! [`VectorIndex`] together with the records its rows were built from. Both
//! live in one immutable [`Corpus`] snapshot behind a single swappable
//! reference, so a rebuild is observed either entirely or not at all.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{NlqError, Result};
use crate::index::VectorIndex;
use crate::projector::project;
use crate::record::{Record, SearchResult};

/// Map a squared distance to a relevance score in `(0, 1]`.
///
/// Distance 0 scores exactly 1.0; larger distances approach 0. The transform
/// is monotone, so it never changes the index's ranking. Any finite distance
/// gives a score strictly above 0.
pub fn relevance_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// One index generation: the matrix and the records for each of its rows.
#[derive(Debug)]
pub struct Corpus {
    index: VectorIndex,
    records: Vec<Record>,
}

impl Corpus {
    /// The vector index of this generation.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// The records of this generation; `records()[slot]` is the source of row `slot`.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

/// Builds and searches the semantic index over a set of records.
pub struct RetrievalEngine {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    corpus: RwLock<Option<Arc<Corpus>>>,
}

impl RetrievalEngine {
    /// Create an engine with no index built yet.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedding_provider, corpus: RwLock::new(None) }
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Build a new index generation from `records`, projected over `fields`.
    ///
    /// All projected texts go to the embedding provider in one batch, and
    /// slot `i` of the new index corresponds to `records[i]`. The previous
    /// generation stays in service until the new one is complete.
    ///
    /// Returns the number of indexed records.
    ///
    /// # Errors
    ///
    /// - [`NlqError::EmptyCorpus`] if `records` is empty.
    /// - [`NlqError::EmbeddingError`] if the provider fails or returns the
    ///   wrong number of vectors.
    /// - [`NlqError::DimensionMismatch`] if the vectors differ in length.
    pub async fn build_index<S: AsRef<str>>(
        &self,
        records: Vec<Record>,
        fields: &[S],
    ) -> Result<usize> {
        if records.is_empty() {
            return Err(NlqError::EmptyCorpus);
        }

        let texts: Vec<String> = records.iter().map(|r| project(&r.fields, fields)).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        info!(
            record_count = records.len(),
            provider = self.embedding_provider.name(),
            "generating embeddings"
        );
        let embeddings = self.embedding_provider.embed_batch(&text_refs).await.map_err(|e| {
            error!(error = %e, "embedding failed during index build");
            e
        })?;

        if embeddings.len() != records.len() {
            return Err(NlqError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "expected {} embeddings, provider returned {}",
                    records.len(),
                    embeddings.len()
                ),
            });
        }

        let index = VectorIndex::build(&embeddings)?;
        let dimension = index.dimension();
        let record_count = records.len();

        *self.corpus.write().await = Some(Arc::new(Corpus { index, records }));

        info!(record_count, dimension, "built vector index");
        Ok(record_count)
    }

    /// Return the `k` records closest to `question`, closest first, each with
    /// a `relevance_score` of `1 / (1 + distance)`.
    ///
    /// # Errors
    ///
    /// - [`NlqError::IndexNotBuilt`] if [`build_index`](Self::build_index)
    ///   has not completed yet.
    /// - [`NlqError::DimensionMismatch`] if the question embedding does not
    ///   match the index dimension.
    /// - [`NlqError::NonFiniteVector`] if the question embedding has a NaN or
    ///   infinite component.
    pub async fn search(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        let corpus = self.snapshot().await.ok_or(NlqError::IndexNotBuilt)?;

        let query_embedding = self
            .embedding_provider
            .embed_batch(&[question])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NlqError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: "provider returned no embedding for the query".to_string(),
            })?;

        let neighbors = corpus.index.search(&query_embedding, k)?;
        debug!(k, hits = neighbors.len(), "vector search completed");

        let results = neighbors
            .into_iter()
            .map(|neighbor| {
                SearchResult::scored(
                    &corpus.records[neighbor.slot],
                    neighbor.slot,
                    neighbor.distance,
                    relevance_score(neighbor.distance),
                )
            })
            .collect();

        Ok(results)
    }

    /// The current index generation, if one has been built.
    pub async fn snapshot(&self) -> Option<Arc<Corpus>> {
        self.corpus.read().await.clone()
    }

    /// Whether an index has been built.
    pub async fn is_ready(&self) -> bool {
        self.corpus.read().await.is_some()
    }

    /// Number of indexed records (0 before the first build).
    pub async fn len(&self) -> usize {
        self.snapshot().await.map_or(0, |corpus| corpus.records.len())
    }

    /// Dimension of the current index, if one has been built.
    pub async fn dimension(&self) -> Option<usize> {
        self.snapshot().await.map(|corpus| corpus.index.dimension())
    }
}
