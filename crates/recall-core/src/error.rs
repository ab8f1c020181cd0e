//! Typed failure taxonomy for store and search operations.
//!
//! The vector-engine seam itself speaks `anyhow` (collaborator style);
//! everything above it returns [`StoreError`] so callers can distinguish
//! "nothing found" from "something broke".

use thiserror::Error;

/// Failures surfaced by the content store, cache, and search layers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An operation was attempted before `initialize()` opened the
    /// backing collection.
    #[error("store not initialized; call initialize() first")]
    NotInitialized,

    /// A lookup by id matched no stored item.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// A query embedding could not be produced. The orchestrator itself
    /// degrades to an empty result list instead of raising this; the
    /// variant exists for callers that treat a missing representation as
    /// an error.
    #[error("query embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The delegated vector engine raised. Propagated verbatim and never
    /// retried here; retry policy belongs to the engine.
    #[error("vector engine failure: {0}")]
    Engine(#[from] anyhow::Error),

    /// A serialized metadata or passage payload failed to parse.
    /// Non-fatal on the read path (logged, defaults applied); fatal on
    /// the write path where it would corrupt the stored row.
    #[error("metadata parse failure: {0}")]
    MetadataParse(#[from] serde_json::Error),
}
