use super::{check_k, check_query_dimension, rank, validate_batch, VectorStore};
use crate::error::Result;
use crate::models::{QueryResult, VectorRecord};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local store. Writers take the lock exclusively, so two adds to the
/// same collection never interleave; queries share it.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

struct MemCollection {
    dimension: usize,
    records: Vec<VectorRecord>,
    positions: HashMap<String, usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut collections = self.collections.write().await;
        let existing = collections.get(collection).map(|c| c.dimension);
        let dimension = validate_batch(&records, existing)?;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(|| MemCollection {
                dimension,
                records: Vec::new(),
                positions: HashMap::new(),
            });
        let added = records.len();
        for record in records {
            match entry.positions.get(&record.id) {
                Some(&pos) => entry.records[pos] = record,
                None => {
                    entry.positions.insert(record.id.clone(), entry.records.len());
                    entry.records.push(record);
                }
            }
        }
        debug!(collection, added, total = entry.records.len(), "stored vectors in memory");
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult> {
        check_k(k)?;
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        if entry.records.is_empty() {
            return Ok(Vec::new());
        }
        check_query_dimension(entry.dimension, vector)?;
        Ok(rank(&entry.records, vector, k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }
}
