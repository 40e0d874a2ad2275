//! Configuration for the query service.

use serde::{Deserialize, Serialize};

use crate::error::{NlqError, Result};
use crate::record::Filters;
use crate::source::SourceConfig;

/// Fields projected into the embedded text when none are configured.
pub const DEFAULT_TEXT_FIELDS: [&str; 6] =
    ["title", "description", "category", "type", "price", "location"];

/// Number of results returned when a request does not ask for a count.
pub const DEFAULT_NUM_RESULTS: usize = 5;

/// What to fetch, how to project it, and how to phrase answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    /// Connection settings handed to [`DataSource::connect`](crate::DataSource::connect).
    #[serde(default)]
    pub source_config: SourceConfig,
    /// Collection or table to fetch records from.
    pub collection: String,
    /// Equality filters applied by the data source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    /// Record fields projected into the embedded text, in order.
    pub text_fields: Vec<String>,
    /// System prompt for the answer synthesizer; empty selects the default.
    #[serde(default)]
    pub context: String,
    /// Number of results when a query does not specify one.
    pub default_num_results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            source_config: SourceConfig::new(),
            collection: String::new(),
            filters: None,
            text_fields: DEFAULT_TEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
            context: String::new(),
            default_num_results: DEFAULT_NUM_RESULTS,
        }
    }
}

impl QueryConfig {
    /// Create a new builder for constructing a [`QueryConfig`].
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`QueryConfig`].
#[derive(Debug, Clone, Default)]
pub struct QueryConfigBuilder {
    config: QueryConfig,
}

impl QueryConfigBuilder {
    /// Set the data-source connection settings.
    pub fn source_config(mut self, source_config: SourceConfig) -> Self {
        self.config.source_config = source_config;
        self
    }

    /// Set the collection or table to fetch.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.config.collection = collection.into();
        self
    }

    /// Set the equality filters. An empty map is treated as no filter.
    pub fn filters(mut self, filters: Filters) -> Self {
        self.config.filters = (!filters.is_empty()).then_some(filters);
        self
    }

    /// Set the projected fields, in order.
    pub fn text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.text_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the synthesizer system prompt.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.config.context = context.into();
        self
    }

    /// Set the default number of results per query.
    pub fn default_num_results(mut self, n: usize) -> Self {
        self.config.default_num_results = n;
        self
    }

    /// Build the [`QueryConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`NlqError::ConfigError`] if:
    /// - `collection` is empty
    /// - `default_num_results == 0`
    pub fn build(self) -> Result<QueryConfig> {
        if self.config.collection.trim().is_empty() {
            return Err(NlqError::ConfigError("collection is required".to_string()));
        }
        if self.config.default_num_results == 0 {
            return Err(NlqError::ConfigError(
                "default_num_results must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}
