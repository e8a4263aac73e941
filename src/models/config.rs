//! Configuration model loaded from external sources.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::search::{PropertyFilters, SearchMode};

/// Settings for the optional sample query run after indexing.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
    pub top_k: usize,
    pub include_visual: bool,
    pub query_id: Option<u64>,
    pub filters: PropertyFilters,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Balanced,
            top_k: 10,
            include_visual: false,
            query_id: None,
            filters: PropertyFilters::default(),
        }
    }
}

/// Process-wide configuration, read once at startup from `config.yaml`
/// (optional) with `PROPMATCH_*` environment overrides.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub records_path: Option<String>,
    pub photo_timeout_secs: u64,
    pub photo_limit: usize,
    pub index_concurrency: usize,
    pub store_timeout_secs: u64,
    pub search_deadline_secs: Option<u64>,
    pub search: SearchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            records_path: None,
            photo_timeout_secs: 10,
            photo_limit: 5,
            index_concurrency: 4,
            store_timeout_secs: 30,
            search_deadline_secs: None,
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("PROPMATCH").separator("__"))
            .build()?
            .try_deserialize()
    }
}
