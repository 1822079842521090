use serde::Deserialize;

use crate::ingest::{DEFAULT_BATCH_SIZE, DEFAULT_INDEX_CAP};

/// Top-level YAML configuration for the binary.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    /// Index endpoint of the remote catalog.
    pub base_url: url::Url,
    #[serde(default = "default_index_cap")]
    pub index_cap: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

fn default_index_cap() -> usize {
    DEFAULT_INDEX_CAP
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_database_url() -> String {
    "sqlite://fieldbook.db".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.catalog.batch_size == 0 {
            return Err("catalog.batch_size must be positive".to_string());
        }
        if self.catalog.index_cap == 0 {
            return Err("catalog.index_cap must be positive".to_string());
        }
        Ok(())
    }
}
