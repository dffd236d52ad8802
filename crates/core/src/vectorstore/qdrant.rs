use super::{check_k, validate_batch, VectorStore};
use crate::error::{Error, Result};
use crate::models::{QueryHit, QueryResult, VectorRecord};
use providers::qdrant::{point_id, QdrantClient, QdrantPoint, SearchResult, RECORD_ID_KEY};
use std::collections::HashMap;

const PAYLOAD_KEY: &str = "document";
const METADATA_KEY: &str = "metadata";

/// Qdrant-backed store. Collections are created on first write with cosine
/// distance; Qdrant's similarity score is reported as distance `1 - score`.
/// Tie order among equal scores is whatever Qdrant returns.
pub struct QdrantStore {
    client: QdrantClient,
}

impl QdrantStore {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

/// Recovers the caller's record from a scored point. Points written by other
/// tools may lack our payload keys; they surface with their point id and
/// empty fields rather than failing the query.
fn to_hit(result: SearchResult) -> QueryHit {
    let payload = result.payload.unwrap_or(serde_json::Value::Null);
    let id = payload
        .get(RECORD_ID_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| match &result.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    let document = payload
        .get(PAYLOAD_KEY)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let metadata = payload
        .get(METADATA_KEY)
        .and_then(|m| serde_json::from_value(m.clone()).ok())
        .unwrap_or_default();
    QueryHit {
        id,
        payload: document,
        metadata,
        distance: 1.0 - result.score,
    }
}

fn storage_error(e: providers::ProviderError) -> Error {
    Error::storage(format!("qdrant: {}", e))
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let dimension = validate_batch(&records, None)?;
        self.client
            .ensure_collection(collection, dimension)
            .await
            .map_err(storage_error)?;
        let points: Vec<QdrantPoint> = records
            .into_iter()
            .map(|r| {
                let mut payload = HashMap::new();
                payload.insert(RECORD_ID_KEY.to_string(), serde_json::json!(r.id));
                payload.insert(PAYLOAD_KEY.to_string(), serde_json::json!(r.payload));
                payload.insert(METADATA_KEY.to_string(), serde_json::json!(r.metadata));
                QdrantPoint {
                    id: point_id(&r.id),
                    vector: r.vector,
                    payload,
                }
            })
            .collect();
        self.client
            .upsert(collection, points)
            .await
            .map_err(storage_error)
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult> {
        check_k(k)?;
        let results = self
            .client
            .search(collection, vector.to_vec(), k as u64)
            .await
            .map_err(storage_error)?;
        Ok(results.into_iter().map(to_hit).collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.client.count(collection).await.map_err(storage_error)
    }
}
