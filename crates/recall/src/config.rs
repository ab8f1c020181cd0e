use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use recall_core::cache::{CacheConfig, CacheTtls};
use recall_core::models::SearchOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "items".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dims: default_dims(),
        }
    }
}

fn default_dims() -> usize {
    384
}

/// Which segmentation strategy the ingestion pipeline applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    Characters,
    Paragraphs,
    Markdown,
}

impl FromStr for ChunkStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "characters" => Ok(ChunkStrategy::Characters),
            "paragraphs" => Ok(ChunkStrategy::Paragraphs),
            "markdown" => Ok(ChunkStrategy::Markdown),
            other => anyhow::bail!(
                "Unknown chunking strategy: '{other}'. Use characters, paragraphs, or markdown."
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub min_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_size: default_max_size(),
            overlap: default_overlap(),
            min_size: 0,
        }
    }
}

impl ChunkingConfig {
    pub fn strategy(&self) -> Result<ChunkStrategy> {
        self.strategy.parse()
    }
}

fn default_strategy() -> String {
    "paragraphs".to_string()
}
fn default_max_size() -> usize {
    1200
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f32,
    #[serde(default = "default_true")]
    pub include_content: bool,
    #[serde(default = "default_true")]
    pub deduplicate: bool,
    #[serde(default)]
    pub max_total_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            min_relevance_score: default_min_relevance_score(),
            include_content: true,
            deduplicate: true,
            max_total_tokens: 0,
        }
    }
}

impl RetrievalConfig {
    pub fn to_options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.limit,
            min_relevance_score: self.min_relevance_score,
            include_content: self.include_content,
            deduplicate: self.deduplicate,
            max_total_tokens: self.max_total_tokens,
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_min_relevance_score() -> f32 {
    0.6
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_list_ttl_secs")]
    pub list_ttl_secs: u64,
    #[serde(default = "default_item_ttl_secs")]
    pub item_ttl_secs: u64,
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,
    #[serde(default = "default_memory_high_water")]
    pub memory_high_water: f64,
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            list_ttl_secs: default_list_ttl_secs(),
            item_ttl_secs: default_item_ttl_secs(),
            search_ttl_secs: default_search_ttl_secs(),
            memory_high_water: default_memory_high_water(),
            memory_budget_mb: default_memory_budget_mb(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttls: CacheTtls {
                list_items: Duration::from_secs(self.list_ttl_secs),
                get_item: Duration::from_secs(self.item_ttl_secs),
                vector_search: Duration::from_secs(self.search_ttl_secs),
                semantic_search: Duration::from_secs(self.search_ttl_secs),
            },
            memory_high_water: self.memory_high_water,
        }
    }
}

fn default_list_ttl_secs() -> u64 {
    300
}
fn default_item_ttl_secs() -> u64 {
    300
}
fn default_search_ttl_secs() -> u64 {
    60
}
fn default_memory_high_water() -> f64 {
    0.7
}
fn default_memory_budget_mb() -> u64 {
    512
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate embedding
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    // Validate chunking
    if config.chunking.max_size == 0 {
        anyhow::bail!("chunking.max_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.max_size");
    }
    config.chunking.strategy()?;

    // Validate retrieval
    if config.retrieval.limit < 1 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.min_relevance_score) {
        anyhow::bail!("retrieval.min_relevance_score must be in [-1.0, 1.0]");
    }

    // Validate cache
    if !(0.0..=1.0).contains(&config.cache.memory_high_water) || config.cache.memory_high_water == 0.0
    {
        anyhow::bail!("cache.memory_high_water must be in (0.0, 1.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("recall.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[store]\npath = \"data/recall.sqlite\"\n");
        let config = load_config(&path).unwrap();

        assert_eq!(config.store.collection, "items");
        assert_eq!(config.embedding.dims, 384);
        assert_eq!(config.chunking.strategy().unwrap(), ChunkStrategy::Paragraphs);
        assert_eq!(config.retrieval.limit, 5);
        assert!((config.retrieval.min_relevance_score - 0.6).abs() < 1e-6);
        assert_eq!(config.cache.search_ttl_secs, 60);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[store]\npath = \"x.sqlite\"\n\n[chunking]\nstrategy = \"sentences\"\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_zero_dims_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[store]\npath = \"x.sqlite\"\n\n[embedding]\ndims = 0\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_overlap_must_stay_under_max_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[store]\npath = \"x.sqlite\"\n\n[chunking]\nmax_size = 100\noverlap = 100\n",
        );
        assert!(load_config(&path).is_err());
    }
}
