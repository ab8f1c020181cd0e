//! In-memory [`VectorEngine`] implementation for tests and embedders.
//!
//! Uses a `HashMap` of row vectors behind `std::sync::RwLock`. Vector
//! search is brute-force cosine similarity over all stored rows, sorted
//! best first — the same semantics the SQLite engine provides, without
//! any I/O.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{EngineHit, EngineRow, VectorEngine};

/// In-memory engine holding one row list per collection.
#[derive(Default)]
pub struct MemoryEngine {
    collections: RwLock<HashMap<String, Vec<EngineRow>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorEngine for MemoryEngine {
    async fn create_collection(&self, name: &str, seed: &[EngineRow]) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.insert(name.to_string(), seed.to_vec());
        Ok(())
    }

    async fn open_collection(&self, name: &str) -> Result<bool> {
        let collections = self.collections.read().unwrap();
        Ok(collections.contains_key(name))
    }

    async fn insert(&self, collection: &str, rows: &[EngineRow]) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        let stored = match collections.get_mut(collection) {
            Some(stored) => stored,
            None => bail!("no such collection: {collection}"),
        };
        for row in rows {
            stored.retain(|r| r.id != row.id);
            stored.push(row.clone());
        }
        Ok(())
    }

    async fn delete_where(&self, collection: &str, column: &str, value: &str) -> Result<u64> {
        let mut collections = self.collections.write().unwrap();
        let stored = match collections.get_mut(collection) {
            Some(stored) => stored,
            None => bail!("no such collection: {collection}"),
        };
        let before = stored.len();
        match column {
            "id" => stored.retain(|r| r.id != value),
            "source_type" => stored.retain(|r| r.source_type != value),
            "source_identifier" => stored.retain(|r| r.source_identifier != value),
            other => bail!("unsupported delete column: {other}"),
        }
        Ok((before - stored.len()) as u64)
    }

    async fn nearest_neighbors(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<EngineHit>> {
        let collections = self.collections.read().unwrap();
        let stored = match collections.get(collection) {
            Some(stored) => stored,
            None => bail!("no such collection: {collection}"),
        };

        let mut hits: Vec<EngineHit> = stored
            .iter()
            .map(|row| EngineHit {
                score: cosine_similarity(vector, &row.vector),
                row: row.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
