//! Content store: durable item storage plus nearest-neighbor retrieval
//! via a delegated [`VectorEngine`].
//!
//! The [`ItemStore`] trait is the read/write surface that decorators
//! (the query cache) wrap; [`ContentStore`] is the concrete
//! implementation over an engine. The store owns its engine handle and
//! collection name explicitly, so tests can run many isolated instances
//! side by side.
//!
//! # Listing limitation
//!
//! The engine seam exposes no native "list all rows" primitive, so
//! [`list_items`](ItemStore::list_items) and
//! [`get_item_by_id`](ItemStore::get_item_by_id) approximate a full scan
//! with a zero-vector nearest-neighbor query capped at [`SCAN_LIMIT`]
//! rows. This mirrors the engine's actual capability and should be
//! replaced if an engine ever grows a real scan operation.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::warn;

use crate::embedding::zero_vector;
use crate::engine::{EngineHit, EngineRow, VectorEngine};
use crate::error::StoreError;
use crate::models::{GetOptions, Item, ItemSummary, ScoredItem, SourceType};

/// Id of the zero-vector placeholder row that seeds every new
/// collection, keeping the engine's index non-empty from creation time.
pub const PLACEHOLDER_ID: &str = "__placeholder__";

/// Row cap for the approximate full scan behind listing and id lookup.
pub const SCAN_LIMIT: usize = 1000;

/// Read/write surface of the content store.
///
/// All operations require [`ContentStore::initialize`] to have run;
/// they fail with [`StoreError::NotInitialized`] otherwise.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert an item, replacing any stored item with the same id.
    /// Returns the stored item.
    async fn add_item(&self, item: Item) -> Result<Item, StoreError>;

    /// Remove an item by id. Returns `false` when the engine reports no
    /// matching row — an idempotent delete, not an error.
    async fn delete_item(&self, id: &str) -> Result<bool, StoreError>;

    /// Lightweight projection of every stored item.
    async fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError>;

    /// The `limit` items nearest to `query`, best first, each annotated
    /// with its cosine-similarity score.
    async fn vector_search(&self, query: &[f32], limit: usize)
        -> Result<Vec<ScoredItem>, StoreError>;

    /// Retrieve a single item by exact id, applying the projection
    /// flags in `options`. Fails with [`StoreError::ItemNotFound`] when
    /// absent.
    async fn get_item_by_id(&self, id: &str, options: &GetOptions) -> Result<Item, StoreError>;
}

/// Content store over a delegated vector engine.
pub struct ContentStore<E: VectorEngine> {
    engine: E,
    collection: String,
    dims: usize,
    initialized: AtomicBool,
}

impl<E: VectorEngine> ContentStore<E> {
    pub fn new(engine: E, collection: impl Into<String>, dims: usize) -> Self {
        Self {
            engine,
            collection: collection.into(),
            dims,
            initialized: AtomicBool::new(false),
        }
    }

    /// Open the backing collection, creating it (seeded with a
    /// zero-vector placeholder row) when it does not exist yet.
    /// Idempotent.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let existed = self.engine.open_collection(&self.collection).await?;
        if !existed {
            let seed = EngineRow {
                id: PLACEHOLDER_ID.to_string(),
                source_type: SourceType::Other.as_str().to_string(),
                source_identifier: String::new(),
                title: String::new(),
                original_path: None,
                extracted_text: String::new(),
                passages_json: "[]".to_string(),
                vector: zero_vector(self.dims),
                metadata: "{}".to_string(),
            };
            self.engine
                .create_collection(&self.collection, &[seed])
                .await?;
        }

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn row_from_item(&self, item: &Item) -> Result<EngineRow, StoreError> {
        Ok(EngineRow {
            id: item.id.clone(),
            source_type: item.source_type.as_str().to_string(),
            source_identifier: item.source_identifier.clone(),
            title: item.title.clone(),
            original_path: item.original_path.clone(),
            extracted_text: item.extracted_text.clone(),
            passages_json: serde_json::to_string(&item.passages)?,
            vector: item.primary_vector.clone(),
            metadata: item.metadata.clone(),
        })
    }

    fn item_from_row(row: EngineRow) -> Item {
        let passages: Vec<String> = serde_json::from_str(&row.passages_json).unwrap_or_else(|e| {
            warn!(id = %row.id, error = %e, "malformed passage payload; treating as empty");
            Vec::new()
        });
        let source_type = SourceType::from_str(&row.source_type).unwrap_or(SourceType::Other);

        Item {
            id: row.id,
            source_type,
            source_identifier: row.source_identifier,
            title: row.title,
            original_path: row.original_path,
            extracted_text: row.extracted_text,
            passages,
            primary_vector: row.vector,
            metadata: row.metadata,
        }
    }

    /// Approximate full scan: zero-vector query with a large cap, the
    /// placeholder row filtered out.
    async fn scan(&self) -> Result<Vec<EngineHit>, StoreError> {
        let hits = self
            .engine
            .nearest_neighbors(&self.collection, &zero_vector(self.dims), SCAN_LIMIT)
            .await?;
        Ok(hits
            .into_iter()
            .filter(|h| h.row.id != PLACEHOLDER_ID)
            .collect())
    }
}

#[async_trait]
impl<E: VectorEngine> ItemStore for ContentStore<E> {
    async fn add_item(&self, item: Item) -> Result<Item, StoreError> {
        self.ensure_initialized()?;
        let row = self.row_from_item(&item)?;
        self.engine.insert(&self.collection, &[row]).await?;
        Ok(item)
    }

    async fn delete_item(&self, id: &str) -> Result<bool, StoreError> {
        self.ensure_initialized()?;
        if id == PLACEHOLDER_ID {
            return Ok(false);
        }
        let removed = self.engine.delete_where(&self.collection, "id", id).await?;
        Ok(removed > 0)
    }

    async fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError> {
        self.ensure_initialized()?;
        let hits = self.scan().await?;
        Ok(hits
            .into_iter()
            .map(|h| {
                let item = Self::item_from_row(h.row);
                ItemSummary {
                    id: item.id,
                    title: item.title,
                    source_type: item.source_type,
                }
            })
            .collect())
    }

    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredItem>, StoreError> {
        self.ensure_initialized()?;
        // Over-request by one so the placeholder never costs a result slot.
        let hits = self
            .engine
            .nearest_neighbors(&self.collection, query, limit + 1)
            .await?;
        let mut scored: Vec<ScoredItem> = hits
            .into_iter()
            .filter(|h| h.row.id != PLACEHOLDER_ID)
            .map(|h| ScoredItem {
                score: h.score,
                item: Self::item_from_row(h.row),
            })
            .collect();
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get_item_by_id(&self, id: &str, options: &GetOptions) -> Result<Item, StoreError> {
        self.ensure_initialized()?;
        let hits = self.scan().await?;
        let hit = hits
            .into_iter()
            .find(|h| h.row.id == id)
            .ok_or_else(|| StoreError::ItemNotFound(id.to_string()))?;

        let mut item = Self::item_from_row(hit.row);
        if !options.include_content {
            item.extracted_text.clear();
            item.passages.clear();
        }
        if !options.include_vector {
            item.primary_vector.clear();
        }
        Ok(item)
    }
}
