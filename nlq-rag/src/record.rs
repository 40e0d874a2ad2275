//! Data types for fetched records and search results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name → value mapping of a record, in source order.
pub type Fields = Map<String, Value>;

/// Output key of [`SearchResult::relevance_score`].
const SCORE_KEY: &str = "relevance_score";

/// Equality-only filter: every `field == value` pair must hold.
pub type Filters = Map<String, Value>;

/// A structured item fetched from a data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Stable identifier, supplied by the source or synthesized from its position.
    pub id: String,
    /// The record's fields in source order.
    pub fields: Fields,
}

impl Record {
    /// Create a record with an explicit identifier.
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }

    /// Create a record, taking its identifier from an `id` or `_id` field when
    /// one is present and falling back to `position` otherwise.
    pub fn from_fields(fields: Fields, position: usize) -> Self {
        let id = ["id", "_id"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(id_text))
            .unwrap_or_else(|| position.to_string());
        Self { id, fields }
    }

    /// Whether every filter pair matches this record's fields exactly.
    pub fn matches(&self, filters: &Filters) -> bool {
        filters.iter().all(|(key, expected)| self.fields.get(key) == Some(expected))
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A retrieved [`Record`] copy with its relevance score.
///
/// Serializes flat: the record fields followed by `relevance_score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Identifier of the source record.
    #[serde(skip)]
    pub record_id: String,
    /// Index slot the result came from.
    #[serde(skip)]
    pub slot: usize,
    /// Squared Euclidean distance to the query.
    #[serde(skip)]
    pub distance: f64,
    /// Copy of the record's fields, minus any stored `relevance_score`.
    #[serde(flatten)]
    pub fields: Fields,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub relevance_score: f64,
}

impl SearchResult {
    /// Copy `record` into a result. A `relevance_score` column in the record
    /// is dropped so the computed score is the only one serialized.
    pub fn scored(record: &Record, slot: usize, distance: f64, relevance_score: f64) -> Self {
        let fields = record
            .fields
            .iter()
            .filter(|(key, _)| key.as_str() != SCORE_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { record_id: record.id.clone(), slot, distance, fields, relevance_score }
    }
}
