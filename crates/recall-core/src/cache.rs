//! Query cache and memory-pressure optimizer.
//!
//! [`CachedStore`] decorates any [`ItemStore`] with memoization of read
//! operations. Write operations (`add_item`, `delete_item`) pass through
//! uncached. Entries are created only after a successful underlying
//! call, expire by per-operation TTL, and are flushed wholesale when the
//! [`MemoryProbe`] reports heap utilization above the high-water mark —
//! checked synchronously before and after every vector-search-class
//! operation, so sustained search load cannot grow the cache without
//! bound. There is no background sweeper.
//!
//! Cache keys combine the operation name with a stable signature of the
//! arguments: vector arguments contribute a truncated, rounded prefix
//! and text arguments a truncated prefix plus a short hash of the
//! option flags — compact keys that stay collision-resistant enough for
//! practical hit rates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::{GetOptions, Item, ItemSummary, ScoredItem, SearchResult};
use crate::store::ItemStore;

/// Probe into the host process's memory situation.
///
/// `heap_utilization` reports a ratio in `[0, 1]`; `request_gc` is a
/// hook for runtimes that expose one and defaults to a no-op.
pub trait MemoryProbe: Send + Sync {
    fn heap_utilization(&self) -> f64;

    fn request_gc(&self) {}
}

/// Probe that never reports pressure. Disables memory-triggered
/// eviction; TTLs still apply.
pub struct NoopProbe;

impl MemoryProbe for NoopProbe {
    fn heap_utilization(&self) -> f64 {
        0.0
    }
}

/// Per-operation entry lifetimes. Listing and single-item reads tolerate
/// longer staleness than vector searches, where freshness matters more
/// for similarity ranking.
#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub list_items: Duration,
    pub get_item: Duration,
    pub vector_search: Duration,
    pub semantic_search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            list_items: Duration::from_secs(300),
            get_item: Duration::from_secs(300),
            vector_search: Duration::from_secs(60),
            semantic_search: Duration::from_secs(60),
        }
    }
}

/// Cache tuning: TTLs plus the heap-utilization high-water mark above
/// which the cache is flushed.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttls: CacheTtls,
    pub memory_high_water: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttls: CacheTtls::default(),
            memory_high_water: 0.7,
        }
    }
}

/// The read-result shapes a cache entry can hold.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Summaries(Vec<ItemSummary>),
    Item(Item),
    Scored(Vec<ScoredItem>),
    Results(Vec<SearchResult>),
}

struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

/// TTL-bounded map of memoized read results.
///
/// Lookups are synchronous map reads under a shared lock; population and
/// flushing serialize on the write lock, so a reader never observes a
/// partially written entry.
#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.read().unwrap();
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    pub fn put(&self, key: String, value: CachedValue, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();
        // Expired entries are dropped opportunistically on population.
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn flush(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stable short signature for a vector argument: the first four
/// components at four decimal places.
pub fn vector_signature(vector: &[f32]) -> String {
    vector
        .iter()
        .take(4)
        .map(|v| format!("{v:.4}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Stable short signature for a text argument: a 64-char prefix plus a
/// hash prefix over the auxiliary option flags.
pub fn text_signature(text: &str, flags: &str) -> String {
    let prefix: String = text.chars().take(64).collect();
    let digest = Sha256::digest(flags.as_bytes());
    let hex = format!("{digest:x}");
    format!("{prefix}#{}", &hex[..16])
}

/// Caching decorator over an [`ItemStore`].
pub struct CachedStore<S: ItemStore> {
    inner: S,
    cache: QueryCache,
    probe: Arc<dyn MemoryProbe>,
    ttls: CacheTtls,
    memory_high_water: f64,
}

impl<S: ItemStore> CachedStore<S> {
    pub fn new(inner: S, probe: Arc<dyn MemoryProbe>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: QueryCache::new(),
            probe,
            ttls: config.ttls,
            memory_high_water: config.memory_high_water,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub(crate) fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Flush everything and ask the host for a collection pass when the
    /// probe reports utilization above the high-water mark.
    pub(crate) fn check_memory_pressure(&self) {
        let utilization = self.probe.heap_utilization();
        if utilization > self.memory_high_water {
            warn!(
                utilization,
                high_water = self.memory_high_water,
                entries = self.cache.len(),
                "memory pressure: flushing query cache"
            );
            self.cache.flush();
            self.probe.request_gc();
        }
    }
}

#[async_trait]
impl<S: ItemStore> ItemStore for CachedStore<S> {
    /// Writes are never cached.
    async fn add_item(&self, item: Item) -> Result<Item, StoreError> {
        self.inner.add_item(item).await
    }

    /// Writes are never cached.
    async fn delete_item(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_item(id).await
    }

    async fn list_items(&self) -> Result<Vec<ItemSummary>, StoreError> {
        let key = "list_items".to_string();
        if let Some(CachedValue::Summaries(summaries)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(summaries);
        }
        let summaries = self.inner.list_items().await?;
        self.cache
            .put(key, CachedValue::Summaries(summaries.clone()), self.ttls.list_items);
        Ok(summaries)
    }

    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredItem>, StoreError> {
        self.check_memory_pressure();

        let key = format!("vector_search:{limit}:{}", vector_signature(query));
        if let Some(CachedValue::Scored(hits)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(hits);
        }

        let hits = self.inner.vector_search(query, limit).await?;
        self.cache
            .put(key, CachedValue::Scored(hits.clone()), self.ttls.vector_search);

        self.check_memory_pressure();
        Ok(hits)
    }

    async fn get_item_by_id(&self, id: &str, options: &GetOptions) -> Result<Item, StoreError> {
        let key = format!(
            "get_item:{id}:{}:{}",
            options.include_content, options.include_vector
        );
        if let Some(CachedValue::Item(item)) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(item);
        }
        let item = self.inner.get_item_by_id(id, options).await?;
        self.cache
            .put(key, CachedValue::Item(item.clone()), self.ttls.get_item);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use crate::engine::memory::MemoryEngine;
    use crate::engine::{EngineHit, EngineRow, VectorEngine};
    use crate::models::SourceType;
    use crate::store::ContentStore;

    const DIMS: usize = 4;

    /// Engine decorator that counts nearest-neighbor invocations.
    struct CountingEngine {
        inner: MemoryEngine,
        searches: AtomicUsize,
    }

    impl CountingEngine {
        fn new() -> Self {
            Self {
                inner: MemoryEngine::new(),
                searches: AtomicUsize::new(0),
            }
        }

        fn search_count(&self) -> usize {
            self.searches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorEngine for CountingEngine {
        async fn create_collection(&self, name: &str, seed: &[EngineRow]) -> Result<()> {
            self.inner.create_collection(name, seed).await
        }

        async fn open_collection(&self, name: &str) -> Result<bool> {
            self.inner.open_collection(name).await
        }

        async fn insert(&self, collection: &str, rows: &[EngineRow]) -> Result<()> {
            self.inner.insert(collection, rows).await
        }

        async fn delete_where(&self, collection: &str, column: &str, value: &str) -> Result<u64> {
            self.inner.delete_where(collection, column, value).await
        }

        async fn nearest_neighbors(
            &self,
            collection: &str,
            vector: &[f32],
            k: usize,
        ) -> Result<Vec<EngineHit>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            self.inner.nearest_neighbors(collection, vector, k).await
        }
    }

    /// Probe with an externally togglable pressure flag.
    struct FlagProbe {
        pressured: AtomicBool,
        gc_requests: AtomicUsize,
    }

    impl FlagProbe {
        fn new() -> Self {
            Self {
                pressured: AtomicBool::new(false),
                gc_requests: AtomicUsize::new(0),
            }
        }
    }

    impl MemoryProbe for FlagProbe {
        fn heap_utilization(&self) -> f64 {
            if self.pressured.load(Ordering::SeqCst) {
                0.95
            } else {
                0.1
            }
        }

        fn request_gc(&self) {
            self.gc_requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn item(id: &str, vector: Vec<f32>) -> Item {
        Item {
            id: id.to_string(),
            source_type: SourceType::Other,
            source_identifier: id.to_string(),
            title: id.to_string(),
            original_path: None,
            extracted_text: "text".to_string(),
            passages: vec!["text".to_string()],
            primary_vector: vector,
            metadata: "{}".to_string(),
        }
    }

    async fn cached_store(
        probe: Arc<dyn MemoryProbe>,
        ttls: CacheTtls,
    ) -> CachedStore<ContentStore<CountingEngine>> {
        let store = ContentStore::new(CountingEngine::new(), "items", DIMS);
        store.initialize().await.unwrap();
        store
            .add_item(item("a", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        CachedStore::new(
            store,
            probe,
            CacheConfig {
                ttls,
                memory_high_water: 0.7,
            },
        )
    }

    #[tokio::test]
    async fn test_vector_search_is_memoized() {
        let cached = cached_store(Arc::new(NoopProbe), CacheTtls::default()).await;
        let query = [1.0, 0.0, 0.0, 0.0];

        let first = cached.vector_search(&query, 5).await.unwrap();
        let second = cached.vector_search(&query, 5).await.unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(cached.inner().engine().search_count(), 1);
    }

    #[tokio::test]
    async fn test_different_arguments_miss() {
        let cached = cached_store(Arc::new(NoopProbe), CacheTtls::default()).await;

        cached
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 5)
            .await
            .unwrap();
        cached
            .vector_search(&[0.0, 1.0, 0.0, 0.0], 5)
            .await
            .unwrap();
        // Same vector, different limit: also a distinct key.
        cached
            .vector_search(&[1.0, 0.0, 0.0, 0.0], 3)
            .await
            .unwrap();

        assert_eq!(cached.inner().engine().search_count(), 3);
    }

    #[tokio::test]
    async fn test_entries_expire_by_ttl() {
        let ttls = CacheTtls {
            vector_search: Duration::from_millis(10),
            ..CacheTtls::default()
        };
        let cached = cached_store(Arc::new(NoopProbe), ttls).await;
        let query = [1.0, 0.0, 0.0, 0.0];

        cached.vector_search(&query, 5).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cached.vector_search(&query, 5).await.unwrap();

        assert_eq!(cached.inner().engine().search_count(), 2);
    }

    #[tokio::test]
    async fn test_writes_pass_through_uncached() {
        let cached = cached_store(Arc::new(NoopProbe), CacheTtls::default()).await;

        cached
            .add_item(item("b", vec![0.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert!(cached.delete_item("b").await.unwrap());
        assert!(cached.cache().is_empty());
    }

    #[tokio::test]
    async fn test_memory_pressure_flushes_cache() {
        let probe = Arc::new(FlagProbe::new());
        let cached = cached_store(probe.clone(), CacheTtls::default()).await;
        let query = [1.0, 0.0, 0.0, 0.0];

        cached.vector_search(&query, 5).await.unwrap();
        assert_eq!(cached.cache().len(), 1);

        probe.pressured.store(true, Ordering::SeqCst);
        cached.vector_search(&query, 5).await.unwrap();

        // Flushed before the lookup (forcing a second engine call) and
        // again after population.
        assert_eq!(cached.inner().engine().search_count(), 2);
        assert!(cached.cache().is_empty());
        assert!(probe.gc_requests.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_list_and_get_are_memoized() {
        let cached = cached_store(Arc::new(NoopProbe), CacheTtls::default()).await;

        cached.list_items().await.unwrap();
        cached.list_items().await.unwrap();
        cached
            .get_item_by_id("a", &GetOptions::default())
            .await
            .unwrap();
        cached
            .get_item_by_id("a", &GetOptions::default())
            .await
            .unwrap();

        // One scan for the list pair, one for the get pair.
        assert_eq!(cached.inner().engine().search_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_call_does_not_populate() {
        let store = ContentStore::new(CountingEngine::new(), "items", DIMS);
        // Deliberately not initialized: every read fails.
        let cached = CachedStore::new(store, Arc::new(NoopProbe), CacheConfig::default());

        assert!(cached.list_items().await.is_err());
        assert!(cached
            .vector_search(&[0.0, 0.0, 0.0, 0.0], 5)
            .await
            .is_err());
        assert!(cached.cache().is_empty());
    }

    #[test]
    fn test_vector_signature_is_short_and_stable() {
        let sig = vector_signature(&[0.123456, -0.9, 0.5, 0.25, 0.75, 0.1]);
        assert_eq!(sig, "0.1235,-0.9000,0.5000,0.2500");
        assert_eq!(sig, vector_signature(&[0.123456, -0.9, 0.5, 0.25, 0.0]));
    }

    #[test]
    fn test_text_signature_truncates_and_hashes_flags() {
        let long = "q".repeat(200);
        let sig = text_signature(&long, "limit=5");
        assert!(sig.starts_with(&"q".repeat(64)));
        assert_ne!(sig, text_signature(&long, "limit=10"));
    }
}
