//! Application configuration: a JSON file, `.env`, and environment overrides.

use std::path::Path;

use anyhow::{Context, Result};
use nlq_rag::chat::{DEFAULT_CHAT_MODEL, DEFAULT_CHAT_URL};
use nlq_rag::config::{DEFAULT_NUM_RESULTS, DEFAULT_TEXT_FIELDS};
use nlq_rag::{Filters, QueryConfig, SourceConfig};
use serde::Deserialize;
use serde_json::Value;

/// Everything the binary needs to assemble a query service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Registry key of the data source (`mongodb`, `postgresql`, ...).
    pub database_type: String,
    /// Adapter-specific connection settings.
    pub database_config: SourceConfig,
    pub collection: String,
    pub filters: Option<Filters>,
    pub text_fields: Vec<String>,
    pub embedding: EmbeddingSettings,
    pub ai: AiSettings,
    pub server: ServerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_type: "mongodb".into(),
            database_config: SourceConfig::new(),
            collection: String::new(),
            filters: None,
            text_fields: DEFAULT_TEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
            embedding: EmbeddingSettings::default(),
            ai: AiSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `fastembed` or `openai`.
    pub provider: String,
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
    /// Model download cache for fastembed.
    pub cache_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "fastembed".into(),
            model: None,
            base_url: None,
            api_key: None,
            dimensions: None,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// System prompt; empty selects the built-in one.
    pub context: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_CHAT_URL.into(),
            api_key: None,
            model: DEFAULT_CHAT_MODEL.into(),
            context: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 5000 }
    }
}

impl AppConfig {
    /// Load from `path` (or defaults when `None`), then apply process
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Overlay deployment variables (`DB_TYPE`, `MONGO_URI`, `DB_NAME`,
    /// `COLLECTION`, `AI_API_URL`, `AI_API_KEY`, `HOST`, `PORT`) read
    /// through `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("DB_TYPE") {
            self.database_type = v;
        }
        if let Some(v) = var("MONGO_URI") {
            self.database_config.insert("uri".into(), Value::String(v));
        }
        if let Some(v) = var("DB_NAME") {
            self.database_config.insert("database".into(), Value::String(v));
        }
        if let Some(v) = var("COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = var("AI_API_URL") {
            self.ai.api_url = v;
        }
        if let Some(v) = var("AI_API_KEY") {
            self.ai.api_key = Some(v);
        }
        if let Some(v) = var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = var("PORT").and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    /// The library-level view of this configuration.
    pub fn query_config(&self) -> nlq_rag::Result<QueryConfig> {
        let mut builder = QueryConfig::builder()
            .source_config(self.database_config.clone())
            .collection(self.collection.clone())
            .text_fields(self.text_fields.iter().cloned())
            .context(self.ai.context.clone())
            .default_num_results(DEFAULT_NUM_RESULTS);
        if let Some(filters) = &self.filters {
            builder = builder.filters(filters.clone());
        }
        builder.build()
    }
}
