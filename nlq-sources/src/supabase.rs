//! Supabase data source over the PostgREST HTTP interface.
//!
//! # Configuration
//!
//! ```json
//! { "url": "https://abc.supabase.co", "key": "<anon or service key>" }
//! ```

use async_trait::async_trait;
use nlq_rag::source::require_str;
use nlq_rag::{DataSource, Filters, NlqError, Record, Result, SourceConfig};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

const ADAPTER: &str = "supabase";

struct Session {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

/// A [`DataSource`] reading Supabase tables through `/rest/v1`.
#[derive(Default)]
pub struct SupabaseSource {
    session: RwLock<Option<Session>>,
}

impl SupabaseSource {
    /// Create an unconnected source.
    pub fn new() -> Self {
        Self::default()
    }

    fn failure(message: impl Into<String>) -> NlqError {
        NlqError::adapter(ADAPTER, message)
    }
}

/// PostgREST operator expression for an equality filter on `value`.
fn filter_expression(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

/// Query parameters selecting every column and applying `filters`.
fn query_params(filters: Option<&Filters>) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(
        filters
            .into_iter()
            .flatten()
            .map(|(column, value)| (column.clone(), filter_expression(value))),
    );
    params
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'))
}

#[async_trait]
impl DataSource for SupabaseSource {
    async fn connect(&self, config: &SourceConfig) -> Result<()> {
        let base_url = require_str(config, ADAPTER, "url")?.to_string();
        let key = require_str(config, ADAPTER, "key")?.to_string();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Self::failure(format!("failed to build HTTP client: {e}")))?;

        debug!(url = %base_url, "configured supabase client");
        *self.session.write().await = Some(Session { client, base_url, key });
        Ok(())
    }

    async fn fetch_data(&self, collection: &str, filters: Option<&Filters>) -> Result<Vec<Record>> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(|| Self::failure("not connected"))?;

        let response = session
            .client
            .get(table_url(&session.base_url, collection))
            .query(&query_params(filters))
            .header("apikey", &session.key)
            .bearer_auth(&session.key)
            .send()
            .await
            .map_err(|e| Self::failure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::failure(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("invalid response body: {e}")))?;
        debug!(table = collection, count = rows.len(), "fetched rows");

        Ok(rows
            .into_iter()
            .enumerate()
            .filter_map(|(i, row)| match row {
                Value::Object(fields) => Some(Record::from_fields(fields, i)),
                _ => None,
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.session.write().await.take();
        Ok(())
    }

    fn name(&self) -> &str {
        ADAPTER
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config(value: Value) -> SourceConfig {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filters_become_postgrest_operators() {
        let filters = config(json!({"city": "Lagos", "beds": 2, "pets": true, "agent": null}));
        assert_eq!(
            query_params(Some(&filters)),
            vec![
                ("select".to_string(), "*".to_string()),
                ("city".to_string(), "eq.Lagos".to_string()),
                ("beds".to_string(), "eq.2".to_string()),
                ("pets".to_string(), "eq.true".to_string()),
                ("agent".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn no_filters_selects_everything() {
        assert_eq!(query_params(None), vec![("select".to_string(), "*".to_string())]);
    }

    #[test]
    fn table_url_ignores_trailing_slash() {
        assert_eq!(
            table_url("https://abc.supabase.co/", "listings"),
            "https://abc.supabase.co/rest/v1/listings"
        );
    }

    #[tokio::test]
    async fn connect_requires_url_and_key() {
        let source = SupabaseSource::new();
        let err = source.connect(&config(json!({"url": "https://abc.supabase.co"}))).await;
        assert!(err.unwrap_err().to_string().contains("'key'"));
        assert!(source.connect(&config(json!({"key": "k"}))).await.is_err());
    }

    #[tokio::test]
    async fn fetch_before_connect_fails() {
        let err = SupabaseSource::new().fetch_data("listings", None).await.unwrap_err();
        assert!(matches!(err, NlqError::AdapterError { ref adapter, .. } if adapter == "supabase"));
    }
}
