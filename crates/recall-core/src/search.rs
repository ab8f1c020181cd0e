//! Semantic search orchestration.
//!
//! The orchestrator composes a cached store's vector search with
//! relevance filtering, deduplication, and token-budget-aware result
//! shaping. It operates entirely through the [`ItemStore`] trait and
//! holds no state of its own — a pure request/response transformer.
//!
//! # Algorithm
//!
//! 1. Without a query vector, return an empty list (a degraded but
//!    valid outcome, distinct from an error).
//! 2. Fetch `min(2 × limit, 20)` candidates to leave room for filtering.
//! 3. Drop candidates scoring below `min_relevance_score`.
//! 4. Parse metadata (malformed blobs degrade to `{}` with a warning),
//!    assemble content from passages, estimate tokens at 4 chars each.
//! 5. Optionally deduplicate by source type + content prefix signature.
//! 6. Truncate to `limit`.
//! 7. Enforce the token budget as a prefix truncation: a result is kept
//!    while the running total before it is under budget; once the
//!    budget is crossed, later results are dropped but results already
//!    included stay included.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::cache::{text_signature, CachedStore, CachedValue};
use crate::error::StoreError;
use crate::models::{ScoredItem, SearchOptions, SearchResult};
use crate::store::ItemStore;

/// Run a semantic search against any [`ItemStore`].
///
/// `query` is used for diagnostics only; the retrieval itself is driven
/// by `query_vec`. Store and engine errors propagate; "no results" and
/// "no query vector" are both `Ok(vec![])`.
pub async fn semantic_search<S: ItemStore>(
    store: &S,
    query: &str,
    query_vec: Option<&[f32]>,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, StoreError> {
    let Some(query_vec) = query_vec else {
        debug!(query, "semantic search skipped: no query vector");
        return Ok(Vec::new());
    };

    let candidate_limit = (options.limit * 2).clamp(1, 20);
    let candidates = store.vector_search(query_vec, candidate_limit).await?;

    let mut results: Vec<SearchResult> = Vec::new();
    let mut seen_signatures: HashSet<String> = HashSet::new();

    for ScoredItem { item, score } in candidates {
        if score < options.min_relevance_score {
            continue;
        }

        let metadata = parse_metadata(&item.id, &item.metadata);
        let assembled = if item.passages.is_empty() {
            item.extracted_text.clone()
        } else {
            item.passages.join("\n\n")
        };
        let content = options.include_content.then_some(assembled);
        let estimated_token_count = content
            .as_ref()
            .map(|c| c.chars().count().div_ceil(4))
            .unwrap_or(0);

        if options.deduplicate {
            let signature = match content.as_ref() {
                Some(c) => format!(
                    "{}:{}",
                    item.source_type,
                    c.chars().take(100).collect::<String>()
                ),
                None => item.id.clone(),
            };
            if !seen_signatures.insert(signature) {
                continue;
            }
        }

        let summary = metadata
            .get("summary")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        results.push(SearchResult {
            item_id: item.id,
            title: item.title,
            source_type: item.source_type,
            source_identifier: item.source_identifier,
            score,
            content,
            summary,
            estimated_token_count,
            metadata,
        });
    }

    results.truncate(options.limit);

    if options.max_total_tokens > 0 {
        let mut running_total = 0usize;
        results.retain(|r| {
            if running_total >= options.max_total_tokens {
                return false;
            }
            running_total += r.estimated_token_count;
            true
        });
    }

    Ok(results)
}

/// Parse a stored metadata blob, degrading to `{}` on failure. A
/// malformed blob must never abort a search.
fn parse_metadata(item_id: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(item_id, error = %e, "malformed item metadata; defaulting to empty object");
            serde_json::json!({})
        }
    }
}

impl<S: ItemStore> CachedStore<S> {
    /// Semantic search with full-result memoization under the search
    /// TTL, keyed by a query-text prefix plus a hash of the option
    /// flags. Memory pressure is checked around the call like any other
    /// vector-search-class operation.
    pub async fn semantic_search(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, StoreError> {
        self.check_memory_pressure();

        let flags = format!(
            "{}:{}:{}:{}:{}",
            options.limit,
            options.min_relevance_score,
            options.include_content,
            options.deduplicate,
            options.max_total_tokens
        );
        let key = format!("semantic_search:{}", text_signature(query, &flags));

        if let Some(CachedValue::Results(results)) = self.cache().get(&key) {
            debug!(%key, "cache hit");
            return Ok(results);
        }

        let results = semantic_search(self, query, query_vec, options).await?;
        self.cache().put(
            key,
            CachedValue::Results(results.clone()),
            self.ttls().semantic_search,
        );

        self.check_memory_pressure();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::cache::{CacheConfig, NoopProbe};
    use crate::models::{GetOptions, Item, ItemSummary, SourceType};

    /// Store stub returning a fixed candidate list and recording the
    /// limits it was asked for.
    struct StubStore {
        candidates: Vec<ScoredItem>,
        calls: AtomicUsize,
        requested_limits: Mutex<Vec<usize>>,
    }

    impl StubStore {
        fn new(candidates: Vec<ScoredItem>) -> Self {
            Self {
                candidates,
                calls: AtomicUsize::new(0),
                requested_limits: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ItemStore for StubStore {
        async fn add_item(&self, item: Item) -> Result<Item, StoreError> {
            Ok(item)
        }

        async fn delete_item(&self, _id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError> {
            Ok(Vec::new())
        }

        async fn vector_search(
            &self,
            _query: &[f32],
            limit: usize,
        ) -> Result<Vec<ScoredItem>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested_limits.lock().unwrap().push(limit);
            let mut candidates = self.candidates.clone();
            candidates.truncate(limit);
            Ok(candidates)
        }

        async fn get_item_by_id(
            &self,
            id: &str,
            _options: &GetOptions,
        ) -> Result<Item, StoreError> {
            Err(StoreError::ItemNotFound(id.to_string()))
        }
    }

    fn candidate(id: &str, score: f32, text: &str) -> ScoredItem {
        ScoredItem {
            item: Item {
                id: id.to_string(),
                source_type: SourceType::Url,
                source_identifier: format!("https://example.com/{id}"),
                title: format!("Item {id}"),
                original_path: None,
                extracted_text: text.to_string(),
                passages: vec![text.to_string()],
                primary_vector: vec![0.0; 4],
                metadata: "{}".to_string(),
            },
            score,
        }
    }

    fn options() -> SearchOptions {
        SearchOptions {
            deduplicate: false,
            ..SearchOptions::default()
        }
    }

    #[tokio::test]
    async fn test_missing_query_vector_returns_empty() {
        let store = StubStore::new(vec![candidate("a", 0.9, "text")]);
        let results = semantic_search(&store, "query", None, &options())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_candidate_overfetch_is_double_limit_capped_at_twenty() {
        let store = StubStore::new(Vec::new());
        let mut opts = options();
        opts.limit = 5;
        semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();
        opts.limit = 15;
        semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();

        let limits = store.requested_limits.lock().unwrap().clone();
        assert_eq!(limits, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_relevance_threshold_filters_candidates() {
        let store = StubStore::new(vec![
            candidate("strong", 0.9, "relevant text"),
            candidate("weak", 0.5, "barely related"),
        ]);
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &options())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item_id, "strong");
    }

    #[tokio::test]
    async fn test_deduplication_by_content_signature() {
        let same = "identical leading content that matches for the first hundred characters";
        let store = StubStore::new(vec![
            candidate("first", 0.9, same),
            candidate("second", 0.8, same),
        ]);

        let mut opts = options();
        opts.deduplicate = true;
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item_id, "first");

        opts.deduplicate = false;
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_with_distinct_source_types_survive() {
        let same = "shared content prefix";
        let mut a = candidate("a", 0.9, same);
        let mut b = candidate("b", 0.8, same);
        a.item.source_type = SourceType::Pdf;
        b.item.source_type = SourceType::Url;
        let store = StubStore::new(vec![a, b]);

        let mut opts = options();
        opts.deduplicate = true;
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_token_budget_is_prefix_truncation() {
        // 2000 chars each → 500 estimated tokens each.
        let store = StubStore::new(vec![
            candidate("a", 0.9, &"a".repeat(2000)),
            candidate("b", 0.85, &"b".repeat(2000)),
            candidate("c", 0.8, &"c".repeat(2000)),
        ]);

        let mut opts = options();
        opts.max_total_tokens = 900;
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item_id, "a");
        assert_eq!(results[1].item_id, "b");
        assert_eq!(results[0].estimated_token_count, 500);
    }

    #[tokio::test]
    async fn test_limit_truncation() {
        let store = StubStore::new(
            (0..8)
                .map(|i| candidate(&format!("i{i}"), 0.9, &format!("text {i}")))
                .collect(),
        );
        let mut opts = options();
        opts.limit = 3;
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_content_omitted_when_not_requested() {
        let store = StubStore::new(vec![candidate("a", 0.9, "some passage text")]);
        let mut opts = options();
        opts.include_content = false;
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &opts)
            .await
            .unwrap();
        assert!(results[0].content.is_none());
        assert_eq!(results[0].estimated_token_count, 0);
    }

    #[tokio::test]
    async fn test_content_falls_back_to_extracted_text() {
        let mut c = candidate("a", 0.9, "full extracted body");
        c.item.passages.clear();
        let store = StubStore::new(vec![c]);
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &options())
            .await
            .unwrap();
        assert_eq!(results[0].content.as_deref(), Some("full extracted body"));
    }

    #[tokio::test]
    async fn test_malformed_metadata_degrades_to_empty_object() {
        let mut c = candidate("a", 0.9, "text");
        c.item.metadata = "not valid json {{{".to_string();
        let store = StubStore::new(vec![c]);
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &options())
            .await
            .unwrap();
        assert_eq!(results[0].metadata, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_summary_lifted_from_metadata() {
        let mut c = candidate("a", 0.9, "text");
        c.item.metadata = r#"{"summary":"a short digest"}"#.to_string();
        let store = StubStore::new(vec![c]);
        let results = semantic_search(&store, "q", Some(&[0.0; 4]), &options())
            .await
            .unwrap();
        assert_eq!(results[0].summary.as_deref(), Some("a short digest"));
    }

    #[tokio::test]
    async fn test_cached_semantic_search_hits_store_once() {
        let store = StubStore::new(vec![candidate("a", 0.9, "text")]);
        let cached = CachedStore::new(store, Arc::new(NoopProbe), CacheConfig::default());

        let first = cached
            .semantic_search("same query", Some(&[0.0; 4]), &options())
            .await
            .unwrap();
        let second = cached
            .semantic_search("same query", Some(&[0.0; 4]), &options())
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
    }
}
