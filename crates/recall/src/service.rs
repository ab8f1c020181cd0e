//! The `SearchService` facade: segmentation + embedding + cached
//! content store composed behind the interface consumed by ingestion
//! services and tools layers.
//!
//! The write path segments extracted text into passages, embeds them,
//! takes the primary vector from the first passage, and stores the
//! item. The read path embeds the query and delegates to the cached
//! semantic search orchestrator. Batch ingestion is partial-success:
//! one malformed item never aborts the rest.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use recall_core::cache::{CachedStore, MemoryProbe};
use recall_core::embedding::{zero_vector, Embedder};
use recall_core::engine::VectorEngine;
use recall_core::error::StoreError;
use recall_core::models::{GetOptions, Item, ItemSummary, SearchOptions, SearchResult, SourceType};
use recall_core::segment;
use recall_core::store::{ContentStore, ItemStore};

use crate::config::{ChunkStrategy, ChunkingConfig, Config};

/// What an extraction adapter must supply to have a document stored.
/// The service computes passages and the primary vector from it.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Stable id; a v4 UUID is generated when absent.
    pub id: Option<String>,
    pub source_type: SourceType,
    pub source_identifier: String,
    pub title: String,
    pub original_path: Option<String>,
    pub extracted_text: String,
    /// Structured metadata; serialized to its string transport form on
    /// storage.
    pub metadata: Value,
}

/// Ingestion and retrieval facade over a cached content store.
pub struct SearchService<E: VectorEngine> {
    store: CachedStore<ContentStore<E>>,
    embedder: Arc<dyn Embedder>,
    strategy: ChunkStrategy,
    chunking: ChunkingConfig,
    defaults: SearchOptions,
}

impl<E: VectorEngine> SearchService<E> {
    pub fn new(
        engine: E,
        embedder: Arc<dyn Embedder>,
        probe: Arc<dyn MemoryProbe>,
        config: &Config,
    ) -> Result<Self> {
        if embedder.dims() != config.embedding.dims {
            anyhow::bail!(
                "embedder produces {} dims but embedding.dims is {}",
                embedder.dims(),
                config.embedding.dims
            );
        }
        let strategy = config.chunking.strategy()?;
        let store = ContentStore::new(
            engine,
            config.store.collection.clone(),
            config.embedding.dims,
        );
        Ok(Self {
            store: CachedStore::new(store, probe, config.cache.to_cache_config()),
            embedder,
            strategy,
            chunking: config.chunking.clone(),
            defaults: config.retrieval.to_options(),
        })
    }

    /// Open or create the backing collection. Idempotent.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.store.inner().initialize().await
    }

    pub fn default_options(&self) -> SearchOptions {
        self.defaults.clone()
    }

    /// Segment, embed, and store one document.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Item, StoreError> {
        let id = request
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut passages = self.segment(&request.extracted_text);
        // Non-empty text must always yield at least one passage.
        if passages.is_empty() && !request.extracted_text.trim().is_empty() {
            passages.push(request.extracted_text.trim().to_string());
        }

        let vectors = self.embedder.embed_batch(&passages).await;
        let primary_vector = vectors
            .into_iter()
            .next()
            .unwrap_or_else(|| zero_vector(self.embedder.dims()));

        let metadata = self.transport_metadata(&request)?;

        let item = Item {
            id,
            source_type: request.source_type,
            source_identifier: request.source_identifier,
            title: request.title,
            original_path: request.original_path,
            extracted_text: request.extracted_text,
            passages,
            primary_vector,
            metadata,
        };

        debug!(id = %item.id, passages = item.passages.len(), "ingesting item");
        self.store.add_item(item).await
    }

    /// Ingest a batch, returning the successfully stored subset.
    /// Failures are logged per item and never abort the rest.
    pub async fn ingest_batch(&self, requests: Vec<IngestRequest>) -> Vec<Item> {
        let total = requests.len();
        let mut stored = Vec::with_capacity(total);
        let mut failures = 0usize;

        for request in requests {
            let source = request.source_identifier.clone();
            match self.ingest(request).await {
                Ok(item) => stored.push(item),
                Err(e) => {
                    failures += 1;
                    warn!(source = %source, error = %e, "batch ingest: item failed");
                }
            }
        }

        if failures > 0 {
            warn!(failures, stored = stored.len(), total, "batch ingest finished with failures");
        } else {
            info!(stored = stored.len(), "batch ingest finished");
        }
        stored
    }

    /// Remove an item by id; `false` when nothing matched.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete_item(id).await
    }

    /// Lightweight projections of every stored item.
    pub async fn list_all(&self) -> Result<Vec<ItemSummary>, StoreError> {
        self.store.list_items().await
    }

    /// Full item view by id, under the given projection flags.
    pub async fn get_by_id(&self, id: &str, options: &GetOptions) -> Result<Item, StoreError> {
        self.store.get_item_by_id(id, options).await
    }

    /// Embed the query and run a cached semantic search. `None` options
    /// use the configured retrieval defaults.
    pub async fn search(
        &self,
        query: &str,
        options: Option<SearchOptions>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let options = options.unwrap_or_else(|| self.defaults.clone());
        let query_vec = self.embedder.embed(query).await;
        self.store
            .semantic_search(query, Some(&query_vec), &options)
            .await
    }

    fn segment(&self, text: &str) -> Vec<String> {
        match self.strategy {
            ChunkStrategy::Characters => {
                segment::chunk_by_characters(text, self.chunking.max_size, self.chunking.overlap)
            }
            ChunkStrategy::Paragraphs => {
                segment::chunk_by_paragraphs(text, self.chunking.max_size, self.chunking.min_size)
            }
            ChunkStrategy::Markdown => segment::chunk_by_markdown(text, self.chunking.max_size),
        }
    }

    /// Serialize request metadata to its transport form, stamping
    /// ingestion time and a content hash for staleness detection.
    fn transport_metadata(&self, request: &IngestRequest) -> Result<String, StoreError> {
        let mut map = match &request.metadata {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                warn!(
                    source = %request.source_identifier,
                    "non-object metadata; nesting under 'value'"
                );
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };

        map.entry("ingested_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        map.entry("content_hash").or_insert_with(|| {
            let digest = Sha256::digest(request.extracted_text.as_bytes());
            Value::String(format!("{digest:x}"))
        });

        Ok(serde_json::to_string(&Value::Object(map))?)
    }
}
