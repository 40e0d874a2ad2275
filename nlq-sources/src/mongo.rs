//! MongoDB data source.
//!
//! Provides [`MongoSource`], which reads whole collections through the
//! official [mongodb](https://docs.rs/mongodb) driver.
//!
//! # Configuration
//!
//! ```json
//! { "uri": "mongodb://localhost:27017/", "database": "listings" }
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::{Client, Database};
use nlq_rag::source::{config_str, require_str};
use nlq_rag::{DataSource, Fields, Filters, NlqError, Record, Result, SourceConfig};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

const ADAPTER: &str = "mongodb";

/// URI used when the config does not name one.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017/";

struct Connection {
    client: Client,
    database: Database,
}

/// A [`DataSource`] backed by a MongoDB database.
///
/// Each filter pair becomes a `{field: {"$eq": value}}` clause of the `find`
/// query, so values are matched with MongoDB's own equality semantics and an
/// object value is compared literally rather than read as operators.
#[derive(Default)]
pub struct MongoSource {
    connection: RwLock<Option<Connection>>,
}

impl MongoSource {
    /// Create an unconnected source.
    pub fn new() -> Self {
        Self::default()
    }

    fn map_err(e: mongodb::error::Error) -> NlqError {
        NlqError::adapter(ADAPTER, e.to_string())
    }
}

/// Build the `find` filter for an equality-only mapping.
///
/// Field names starting with `$` are rejected; they would be read as query
/// operators.
fn filter_document(filters: Option<&Filters>) -> Result<Document> {
    let mut document = Document::new();
    for (field, value) in filters.into_iter().flatten() {
        if field.starts_with('$') {
            return Err(NlqError::adapter(
                ADAPTER,
                format!("invalid filter: operator field '{field}' is not an equality filter"),
            ));
        }
        let value = bson::to_bson(value)
            .map_err(|e| NlqError::adapter(ADAPTER, format!("invalid filter: {e}")))?;
        document.insert(field.clone(), doc! { "$eq": value });
    }
    Ok(document)
}

/// Convert a fetched document to record fields; ObjectId `_id`s become hex strings.
fn document_to_fields(mut document: Document) -> Fields {
    if let Ok(oid) = document.get_object_id("_id") {
        document.insert("_id", oid.to_hex());
    }
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

#[async_trait]
impl DataSource for MongoSource {
    async fn connect(&self, config: &SourceConfig) -> Result<()> {
        let uri = config_str(config, "uri").unwrap_or(DEFAULT_URI);
        let database = require_str(config, ADAPTER, "database")?;

        let client = Client::with_uri_str(uri).await.map_err(Self::map_err)?;
        let database = client.database(database);
        debug!(database = database.name(), "connected to mongodb");

        *self.connection.write().await = Some(Connection { client, database });
        Ok(())
    }

    async fn fetch_data(&self, collection: &str, filters: Option<&Filters>) -> Result<Vec<Record>> {
        let connection = self.connection.read().await;
        let connection =
            connection.as_ref().ok_or_else(|| NlqError::adapter(ADAPTER, "not connected"))?;

        let filter = filter_document(filters)?;
        let documents: Vec<Document> = connection
            .database
            .collection::<Document>(collection)
            .find(filter)
            .await
            .map_err(Self::map_err)?
            .try_collect::<Vec<_>>()
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = documents.len(), "fetched documents");
        Ok(documents
            .into_iter()
            .enumerate()
            .map(|(i, document)| Record::from_fields(document_to_fields(document), i))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        if let Some(connection) = self.connection.write().await.take() {
            connection.client.shutdown().await;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        ADAPTER
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    use super::*;

    #[test]
    fn object_ids_become_hex_strings() {
        let oid = ObjectId::new();
        let fields = document_to_fields(doc! { "_id": oid, "title": "Loft", "beds": 2 });

        assert_eq!(fields["_id"], json!(oid.to_hex()));
        assert_eq!(fields["title"], "Loft");
        assert_eq!(fields["beds"], 2);
        assert_eq!(Record::from_fields(fields, 0).id, oid.to_hex());
    }

    #[test]
    fn field_order_is_preserved() {
        let fields = document_to_fields(doc! { "b": 1, "a": 2 });
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn filters_become_the_query_document() {
        let filters = json!({"city": "Lagos", "beds": 2}).as_object().cloned().unwrap();
        let filter = filter_document(Some(&filters)).unwrap();
        assert_eq!(filter, doc! { "city": { "$eq": "Lagos" }, "beds": { "$eq": 2_i64 } });
        assert!(filter_document(None).unwrap().is_empty());
    }

    #[test]
    fn operator_shaped_values_match_literally() {
        let filters = json!({"price": {"$gt": 0}}).as_object().cloned().unwrap();
        let filter = filter_document(Some(&filters)).unwrap();
        assert_eq!(filter, doc! { "price": { "$eq": { "$gt": 0_i64 } } });
    }

    #[test]
    fn operator_fields_are_rejected() {
        let filters = json!({"$where": "sleep(1000)"}).as_object().cloned().unwrap();
        let err = filter_document(Some(&filters)).unwrap_err();
        assert!(matches!(err, NlqError::AdapterError { .. }));
        assert!(err.to_string().contains("$where"));
    }

    #[tokio::test]
    async fn fetch_before_connect_fails() {
        let err = MongoSource::new().fetch_data("homes", None).await.unwrap_err();
        assert!(matches!(err, NlqError::AdapterError { .. }));
    }

    #[tokio::test]
    async fn connect_requires_a_database_name() {
        let config = json!({"uri": DEFAULT_URI}).as_object().cloned().unwrap();
        let err = MongoSource::new().connect(&config).await.unwrap_err();
        assert!(err.to_string().contains("database"));
    }
}
