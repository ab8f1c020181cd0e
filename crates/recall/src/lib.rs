//! # Recall
//!
//! **A content ingestion and semantic retrieval pipeline for
//! heterogeneous documents.**
//!
//! Recall takes extracted document text (from PDF, web page, or video
//! transcript adapters), splits it into retrievable passages, embeds
//! those passages as vectors, and serves nearest-neighbor semantic
//! search with relevance filtering, deduplication, and
//! token-budget-aware result shaping.
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Extraction  │──▶│  Segment +    │──▶│   SQLite    │
//! │ adapters    │   │  Embed       │   │ vector rows │
//! └─────────────┘   └──────────────┘   └──────┬──────┘
//!                                             │
//!                        query ──▶ embed ──▶ cached search
//!                                             │
//!                                  filter · dedup · token budget
//! ```
//!
//! ## Data Flow
//!
//! 1. Extraction adapters (out of scope here) hand over an
//!    [`service::IngestRequest`] — extracted text plus source metadata.
//! 2. [`service::SearchService::ingest`] segments the text into passages
//!    ([`recall_core::segment`]), embeds them
//!    ([`recall_core::embedding`]), and stores the item through the
//!    cached content store.
//! 3. Queries are embedded and answered by the semantic search
//!    orchestrator ([`recall_core::search`]) over the query cache
//!    ([`recall_core::cache`]).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`sqlite_engine`] | SQLite-backed vector engine |
//! | [`probe`] | Process memory probe for cache pressure eviction |
//! | [`service`] | The `SearchService` facade consumed by callers |

pub mod config;
pub mod db;
pub mod probe;
pub mod service;
pub mod sqlite_engine;

pub use recall_core::models::{
    GetOptions, Item, ItemSummary, SearchOptions, SearchResult, SourceType,
};
pub use service::{IngestRequest, SearchService};
