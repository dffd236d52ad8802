use super::{check_k, check_query_dimension, rank, validate_batch, VectorStore};
use crate::error::{Error, Result};
use crate::models::{QueryResult, VectorRecord};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use storage::models::NewVectorRow;
use storage::records;
use tokio::sync::Mutex;

/// Persistent local store: rows live in SQLite, ranking happens in process by
/// exact scan. Writes are serialised so the first batch into an empty
/// collection alone decides its dimension.
#[derive(Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl SqliteVectorStore {
    /// Connects and applies migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = storage::connect(database_url)
            .await
            .map_err(storage_error)?;
        storage::migrate(&pool).await.map_err(storage_error)?;
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    async fn load(&self, collection: &str) -> Result<Vec<VectorRecord>> {
        let rows = records::load_rows(&self.pool, collection)
            .await
            .map_err(storage_error)?;
        rows.into_iter()
            .map(|row| {
                let vector = records::decode_vector(&row.vector).map_err(storage_error)?;
                let metadata: HashMap<String, String> = serde_json::from_str(&row.metadata_json)
                    .map_err(|e| Error::storage(format!("metadata of {}: {}", row.id, e)))?;
                Ok(VectorRecord {
                    id: row.id,
                    vector,
                    payload: row.payload,
                    metadata,
                })
            })
            .collect()
    }
}

fn storage_error(e: anyhow::Error) -> Error {
    Error::storage(format!("{:#}", e))
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        validate_batch(&records, None)?;
        let rows = records
            .into_iter()
            .map(|r| {
                Ok(NewVectorRow {
                    metadata_json: serde_json::to_string(&r.metadata)
                        .map_err(|e| Error::storage(e.to_string()))?,
                    id: r.id,
                    vector: r.vector,
                    payload: r.payload,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let _guard = self.writer.lock().await;
        records::upsert_rows(&self.pool, collection, &rows)
            .await
            .map_err(storage_error)
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult> {
        check_k(k)?;
        let stored = self.load(collection).await?;
        let Some(first) = stored.first() else {
            return Ok(Vec::new());
        };
        check_query_dimension(first.vector.len(), vector)?;
        Ok(rank(&stored, vector, k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        records::count_rows(&self.pool, collection)
            .await
            .map_err(storage_error)
    }
}
