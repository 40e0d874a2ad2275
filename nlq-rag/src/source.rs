//! Data-source trait and an in-memory implementation.
//!
//! Concrete database backends live in the `nlq-sources` crate; every one of
//! them exposes the same connect / fetch / close capability set defined here.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{NlqError, Result};
use crate::record::{Filters, Record};

/// Backend-specific connection settings (URIs, credentials, database names).
pub type SourceConfig = Map<String, Value>;

/// A supplier of records from some storage backend.
///
/// Methods take `&self`; implementations keep their connection behind
/// interior mutability so one source can be shared as `Arc<dyn DataSource>`.
///
/// Collection and table names come from trusted configuration. Filter values
/// do not, and implementations must never interpolate them into query text.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Open the connection described by `config`.
    async fn connect(&self, config: &SourceConfig) -> Result<()>;

    /// Fetch all records of `collection` whose fields equal every filter pair.
    async fn fetch_data(&self, collection: &str, filters: Option<&Filters>) -> Result<Vec<Record>>;

    /// Release the connection. Closing an unconnected source is a no-op.
    async fn close(&self) -> Result<()>;

    /// The adapter name for diagnostics.
    fn name(&self) -> &str;
}

/// Read an optional string setting from a source config.
pub fn config_str<'a>(config: &'a SourceConfig, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Read a required string setting from a source config.
pub fn require_str<'a>(config: &'a SourceConfig, adapter: &str, key: &str) -> Result<&'a str> {
    config_str(config, key)
        .ok_or_else(|| NlqError::adapter(adapter, format!("missing '{key}' in database_config")))
}

/// A [`DataSource`] over records held in memory.
///
/// Collections can be seeded in code with [`with_collection`](Self::with_collection)
/// or supplied on `connect` as `{"collections": {"name": [ {..}, .. ]}}`.
#[derive(Debug, Default)]
pub struct InMemorySource {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `name` with `rows`; ids come from `id`/`_id` fields or row position.
    pub fn with_collection(
        mut self,
        name: impl Into<String>,
        rows: Vec<Map<String, Value>>,
    ) -> Self {
        let records =
            rows.into_iter().enumerate().map(|(i, f)| Record::from_fields(f, i)).collect();
        self.collections.get_mut().insert(name.into(), records);
        self
    }
}

fn parse_collections(config: &SourceConfig) -> Result<HashMap<String, Vec<Record>>> {
    let Some(collections) = config.get("collections") else {
        return Ok(HashMap::new());
    };
    let collections = collections
        .as_object()
        .ok_or_else(|| NlqError::adapter("memory", "'collections' must be an object"))?;

    collections
        .iter()
        .map(|(name, rows)| {
            let rows = rows.as_array().ok_or_else(|| {
                NlqError::adapter("memory", format!("collection '{name}' must be an array"))
            })?;
            let records = rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    row.as_object().cloned().map(|f| Record::from_fields(f, i)).ok_or_else(|| {
                        NlqError::adapter("memory", format!("row {i} of '{name}' is not an object"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((name.clone(), records))
        })
        .collect()
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn connect(&self, config: &SourceConfig) -> Result<()> {
        let parsed = parse_collections(config)?;
        let mut collections = self.collections.write().await;
        collections.extend(parsed);
        debug!(collections = collections.len(), "memory source connected");
        Ok(())
    }

    async fn fetch_data(&self, collection: &str, filters: Option<&Filters>) -> Result<Vec<Record>> {
        let collections = self.collections.read().await;
        let records = collections.get(collection).map(Vec::as_slice).unwrap_or_default();
        Ok(records
            .iter()
            .filter(|record| filters.is_none_or(|f| record.matches(f)))
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
