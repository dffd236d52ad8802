use crate::http::send_checked;
use crate::ProviderError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    cfg: QdrantConfig,
}

/// Payload key holding the caller's record id; Qdrant only accepts UUIDs and
/// integers as point ids.
pub const RECORD_ID_KEY: &str = "record_id";

/// Maps an arbitrary record id onto a stable UUID point id.
pub fn point_id(record_id: &str) -> String {
    let digest = blake3::hash(record_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    uuid::Uuid::from_bytes(bytes).to_string()
}

/// Qdrant answers 404 for a collection that was never written; reads treat
/// that as empty instead of failing.
fn missing_collection<T>(err: ProviderError, empty: T) -> Result<T, ProviderError> {
    match err {
        ProviderError::Status { status: 404, .. } => Ok(empty),
        e => Err(e),
    }
}

impl QdrantClient {
    pub fn new(cfg: QdrantConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.url.trim_end_matches('/'), path)
    }

    fn with_key(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.cfg.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    /// Creates `collection` with cosine distance unless it already exists.
    pub async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), ProviderError> {
        let url = self.url(&format!("/collections/{}", collection));
        match send_checked(self.with_key(self.client.get(&url))).await {
            Ok(_) => return Ok(()),
            Err(ProviderError::Status { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }
        let body = serde_json::json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        send_checked(self.with_key(self.client.put(&url).json(&body))).await?;
        Ok(())
    }

    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        #[derive(Serialize)]
        struct SearchRequest {
            vector: Vec<f32>,
            limit: u64,
            with_payload: bool,
        }
        let url = self.url(&format!("/collections/{}/points/search", collection));
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let resp = match send_checked(self.with_key(self.client.post(url).json(&body))).await {
            Ok(resp) => resp,
            Err(e) => return missing_collection(e, Vec::new()),
        };
        let parsed: QdrantSearchResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result)
    }

    /// Upserts and waits for the write to be applied, so a following search
    /// sees it.
    pub async fn upsert(
        &self,
        collection: &str,
        points: Vec<QdrantPoint>,
    ) -> Result<(), ProviderError> {
        let url = self.url(&format!("/collections/{}/points?wait=true", collection));
        let req = QdrantUpsert { points };
        send_checked(self.with_key(self.client.put(url).json(&req))).await?;
        Ok(())
    }

    pub async fn count(&self, collection: &str) -> Result<usize, ProviderError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: usize,
        }
        #[derive(Deserialize)]
        struct CountResponse {
            result: CountResult,
        }
        let url = self.url(&format!("/collections/{}/points/count", collection));
        let body = serde_json::json!({ "exact": true });
        let resp = match send_checked(self.with_key(self.client.post(url).json(&body))).await {
            Ok(resp) => resp,
            Err(e) => return missing_collection(e, 0),
        };
        let parsed: CountResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result.count)
    }
}

#[derive(Debug, Serialize)]
pub struct QdrantUpsert {
    pub points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
pub struct QdrantPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct QdrantSearchResponse {
    pub result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: serde_json::Value,
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}
