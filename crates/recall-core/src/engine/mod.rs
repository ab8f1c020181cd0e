//! Vector-index engine abstraction.
//!
//! The [`VectorEngine`] trait is the seam to the delegated external
//! index: Recall does not implement approximate-nearest-neighbor
//! structures itself, it stores rows through an engine and asks it for
//! the nearest vectors. Opening a connection is constructor territory
//! for each engine (`SqliteEngine::connect(path)` in the app crate,
//! [`MemoryEngine::new`](memory::MemoryEngine::new) here); the trait
//! covers collection lifecycle and row operations.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_collection`](VectorEngine::create_collection) | Create a collection, seeded so it is never empty |
//! | [`open_collection`](VectorEngine::open_collection) | Open an existing collection, reporting whether it existed |
//! | [`insert`](VectorEngine::insert) | Insert rows, replacing rows with matching ids |
//! | [`delete_where`](VectorEngine::delete_where) | Delete rows matching a column value |
//! | [`nearest_neighbors`](VectorEngine::nearest_neighbors) | The k nearest rows to a query vector |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A row as persisted by the delegated vector-index engine.
///
/// This is the transport shape of an item: passages travel as a JSON
/// array string and metadata as its serialized blob, leaving the engine
/// free of any knowledge of their structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRow {
    pub id: String,
    pub source_type: String,
    pub source_identifier: String,
    pub title: String,
    pub original_path: Option<String>,
    pub extracted_text: String,
    pub passages_json: String,
    pub vector: Vec<f32>,
    pub metadata: String,
}

/// A row returned from a nearest-neighbor query, annotated with its
/// score (cosine similarity, higher is more relevant).
#[derive(Debug, Clone)]
pub struct EngineHit {
    pub row: EngineRow,
    pub score: f32,
}

/// Abstract vector-index engine.
///
/// Engines return `anyhow::Result`; the store layer wraps failures as
/// `StoreError::Engine` and propagates them verbatim. Retry policy
/// belongs to the engine, not its callers.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// Create a collection and insert `seed` rows into it.
    ///
    /// Engines may behave poorly on empty indexes, so callers seed new
    /// collections with at least one placeholder row.
    async fn create_collection(&self, name: &str, seed: &[EngineRow]) -> Result<()>;

    /// Open a collection, returning whether it already existed.
    async fn open_collection(&self, name: &str) -> Result<bool>;

    /// Insert rows. A row whose id matches an existing row replaces it.
    async fn insert(&self, collection: &str, rows: &[EngineRow]) -> Result<()>;

    /// Delete all rows where `column` equals `value`, returning the
    /// number of rows removed. Deleting with no match is a normal
    /// outcome, not an error.
    async fn delete_where(&self, collection: &str, column: &str, value: &str) -> Result<u64>;

    /// Return the `k` rows nearest to `vector`, best first.
    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<EngineHit>>;
}
