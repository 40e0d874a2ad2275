//! Firebase Cloud Firestore data source over the REST `runQuery` endpoint.
//!
//! # Configuration
//!
//! ```json
//! { "project_id": "my-project", "access_token": "ya29...." }
//! { "project_id": "demo", "emulator_host": "localhost:8080" }
//! ```
//!
//! `database` defaults to `(default)`. Against the emulator no token is
//! required.

use async_trait::async_trait;
use nlq_rag::source::{config_str, require_str};
use nlq_rag::{DataSource, Fields, Filters, NlqError, Record, Result, SourceConfig};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::debug;

const ADAPTER: &str = "firebase";

const PRODUCTION_HOST: &str = "https://firestore.googleapis.com";
const DEFAULT_DATABASE: &str = "(default)";
const EMULATOR_TOKEN: &str = "owner";

struct Session {
    client: reqwest::Client,
    query_url: String,
    token: String,
}

/// A [`DataSource`] reading Firestore collections.
#[derive(Default)]
pub struct FirestoreSource {
    session: RwLock<Option<Session>>,
}

impl FirestoreSource {
    /// Create an unconnected source.
    pub fn new() -> Self {
        Self::default()
    }

    fn failure(message: impl Into<String>) -> NlqError {
        NlqError::adapter(ADAPTER, message)
    }
}

fn query_url(config: &SourceConfig) -> Result<String> {
    let project = require_str(config, ADAPTER, "project_id")?;
    let database = config_str(config, "database").unwrap_or(DEFAULT_DATABASE);
    let host = match config_str(config, "emulator_host") {
        Some(host) if host.starts_with("http") => host.trim_end_matches('/').to_string(),
        Some(host) => format!("http://{host}"),
        None => PRODUCTION_HOST.to_string(),
    };
    Ok(format!("{host}/v1/projects/{project}/databases/{database}/documents:runQuery"))
}

/// Encode a JSON value as a Firestore typed value.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({"integerValue": i.to_string()}),
            None => json!({"doubleValue": n.as_f64()}),
        },
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => {
            json!({"arrayValue": {"values": items.iter().map(encode_value).collect::<Vec<_>>()}})
        }
        Value::Object(map) => {
            let fields: Map<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect();
            json!({"mapValue": {"fields": fields}})
        }
    }
}

/// Decode a Firestore typed value to plain JSON.
fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        "doubleValue" => match inner {
            Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner.get("fields").and_then(Value::as_object).map(decode_fields).unwrap_or_default(),
        ),
        // nullValue, booleanValue, stringValue, timestampValue, bytesValue,
        // referenceValue and geoPointValue carry plain JSON already.
        _ => inner.clone(),
    }
}

fn decode_fields(fields: &Map<String, Value>) -> Fields {
    fields.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect()
}

fn field_filter(field: &str, value: &Value) -> Value {
    if value.is_null() {
        json!({"unaryFilter": {"op": "IS_NULL", "field": {"fieldPath": field}}})
    } else {
        json!({"fieldFilter": {
            "field": {"fieldPath": field},
            "op": "EQUAL",
            "value": encode_value(value),
        }})
    }
}

/// The `runQuery` body for `collection`, with every filter `AND`ed.
fn structured_query(collection: &str, filters: Option<&Filters>) -> Value {
    let mut query = json!({"from": [{"collectionId": collection}]});
    let mut clauses: Vec<Value> =
        filters.into_iter().flatten().map(|(field, value)| field_filter(field, value)).collect();

    let condition = match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({"compositeFilter": {"op": "AND", "filters": clauses}})),
    };
    if let (Some(condition), Some(map)) = (condition, query.as_object_mut()) {
        map.insert("where".into(), condition);
    }
    json!({"structuredQuery": query})
}

/// Turn one `runQuery` response element into a record, id first.
fn document_record(entry: &Value) -> Option<Record> {
    let document = entry.get("document")?;
    let id = document.get("name")?.as_str()?.rsplit('/').next()?.to_string();

    let mut fields = Fields::new();
    fields.insert("id".into(), Value::String(id.clone()));
    if let Some(stored) = document.get("fields").and_then(Value::as_object) {
        fields.extend(decode_fields(stored));
    }
    Some(Record::new(id, fields))
}

#[async_trait]
impl DataSource for FirestoreSource {
    async fn connect(&self, config: &SourceConfig) -> Result<()> {
        let query_url = query_url(config)?;
        let token = match config_str(config, "access_token") {
            Some(token) => token.to_string(),
            None if config_str(config, "emulator_host").is_some() => EMULATOR_TOKEN.to_string(),
            None => {
                return Err(Self::failure("missing 'access_token' in database_config"));
            }
        };
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Self::failure(format!("failed to build HTTP client: {e}")))?;

        debug!(url = %query_url, "configured firestore client");
        *self.session.write().await = Some(Session { client, query_url, token });
        Ok(())
    }

    async fn fetch_data(&self, collection: &str, filters: Option<&Filters>) -> Result<Vec<Record>> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(|| Self::failure("not connected"))?;

        let response = session
            .client
            .post(&session.query_url)
            .bearer_auth(&session.token)
            .json(&structured_query(collection, filters))
            .send()
            .await
            .map_err(|e| Self::failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::failure(format!("HTTP {status}: {body}")));
        }

        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("invalid response body: {e}")))?;
        let records: Vec<Record> = entries.iter().filter_map(document_record).collect();
        debug!(collection, count = records.len(), "fetched documents");
        Ok(records)
    }

    async fn close(&self) -> Result<()> {
        self.session.write().await.take();
        Ok(())
    }

    fn name(&self) -> &str {
        ADAPTER
    }
}
