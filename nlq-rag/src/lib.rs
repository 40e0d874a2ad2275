//! # nlq-rag
//!
//! Semantic retrieval for natural-language questions over structured records.
//!
//! Records fetched from a [`DataSource`] are projected to text
//! ([`project`]), embedded in one batch by an [`EmbeddingProvider`], and
//! stored in an exact squared-Euclidean [`VectorIndex`]. Queries are embedded
//! the same way, matched against the index, scored with
//! `1 / (1 + distance)` and handed to an [`AnswerSynthesizer`].
//!
//! ## Features
//!
//! - `openai` — OpenAI-compatible embedding provider and chat synthesizer
//! - `fastembed` — local sentence-transformer embeddings
//! - `full` — everything

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod projector;
pub mod record;
pub mod service;
pub mod source;
pub mod synthesizer;

#[cfg(feature = "openai")]
pub mod chat;
#[cfg(feature = "fastembed")]
pub mod fastembed;
#[cfg(feature = "openai")]
pub mod openai;

pub use config::{QueryConfig, QueryConfigBuilder};
pub use embedding::EmbeddingProvider;
pub use engine::{Corpus, RetrievalEngine, relevance_score};
pub use error::{NlqError, Result};
pub use index::{Neighbor, VectorIndex};
pub use projector::project;
pub use record::{Fields, Filters, Record, SearchResult};
pub use service::{QueryResponse, QueryService, QueryServiceBuilder};
pub use source::{DataSource, InMemorySource, SourceConfig};
pub use synthesizer::{AnswerSynthesizer, ERROR_ANSWER_PREFIX};
