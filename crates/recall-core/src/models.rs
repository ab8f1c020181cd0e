//! Core data models used throughout Recall.
//!
//! These types represent the items, passages, and search results that
//! flow through the ingestion and retrieval pipeline. [`Item`] is the
//! persisted shape; [`ItemSummary`], [`ScoredItem`], and [`SearchResult`]
//! are derived views that are never written back to storage.

use serde::{Deserialize, Serialize};

/// Where a stored document originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Url,
    Youtube,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Url => "url",
            SourceType::Youtube => "youtube",
            SourceType::Other => "other",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(SourceType::Pdf),
            "url" => Ok(SourceType::Url),
            "youtube" => Ok(SourceType::Youtube),
            "other" => Ok(SourceType::Other),
            other => Err(format!(
                "unknown source type: '{other}'. Use pdf, url, youtube, or other."
            )),
        }
    }
}

/// A stored document: metadata, full extracted text, the chunked
/// passages, and the primary embedding vector.
///
/// Invariants maintained by the ingestion pipeline:
/// - `passages` is non-empty whenever `extracted_text` is non-empty;
/// - `primary_vector.len()` equals the configured embedding dimension
///   (it is taken from the first passage's embedding, or is a zero
///   vector for empty documents).
///
/// `metadata` is an open key/value map carried in its serialized JSON
/// form for storage transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub source_type: SourceType,
    pub source_identifier: String,
    pub title: String,
    pub original_path: Option<String>,
    pub extracted_text: String,
    pub passages: Vec<String>,
    pub primary_vector: Vec<f32>,
    pub metadata: String,
}

/// Lightweight projection of an [`Item`] for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub id: String,
    pub title: String,
    pub source_type: SourceType,
}

/// An item annotated with its relevance score for a query vector.
///
/// Scores are cosine similarity, higher-is-more-relevant, in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: Item,
    pub score: f32,
}

/// A shaped search result returned by the orchestrator. Derived, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub item_id: String,
    pub title: String,
    pub source_type: SourceType,
    pub source_identifier: String,
    /// Cosine similarity against the query vector (higher is better).
    pub score: f32,
    /// Assembled passage text, present when content was requested.
    pub content: Option<String>,
    /// Lifted from the parsed metadata `summary` key when present.
    pub summary: Option<String>,
    /// `ceil(content length / 4)` — a coarse token approximation; 0 when
    /// content was not requested.
    pub estimated_token_count: usize,
    /// Parsed metadata; defaults to `{}` when the stored blob is
    /// malformed.
    pub metadata: serde_json::Value,
}

/// Tuning knobs for a semantic search invocation.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum results to return.
    pub limit: usize,
    /// Candidates scoring below this are discarded.
    pub min_relevance_score: f32,
    /// Assemble `content` from passages for each result.
    pub include_content: bool,
    /// Drop later candidates whose signature (source type + content
    /// prefix) was already seen.
    pub deduplicate: bool,
    /// Token budget across the ordered result list; 0 disables it.
    pub max_total_tokens: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_relevance_score: 0.6,
            include_content: true,
            deduplicate: true,
            max_total_tokens: 0,
        }
    }
}

impl SearchOptions {
    /// Preset for recommendation-style calls: stricter relevance bar,
    /// deduplication on.
    pub fn for_recommendations() -> Self {
        Self {
            min_relevance_score: 0.65,
            deduplicate: true,
            ..Self::default()
        }
    }
}

/// Projection flags for single-item retrieval.
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Include `extracted_text` and `passages` in the returned view.
    pub include_content: bool,
    /// Include `primary_vector` in the returned view.
    pub include_vector: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            include_content: true,
            include_vector: false,
        }
    }
}
