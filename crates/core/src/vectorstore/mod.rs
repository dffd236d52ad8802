//! Namespaced vector stores.
//!
//! Every backend ranks by cosine distance, breaks ties by insertion order and
//! overwrites records that are re-added under an existing id (the record keeps
//! its original position).

use crate::error::{Error, Result};
use crate::models::{QueryHit, QueryResult, VectorRecord};
use providers::ProviderError;
use std::cmp::Ordering;

mod memory;
mod qdrant;
mod sqlite;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use sqlite::SqliteVectorStore;

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites `records` in `collection`. The batch is validated
    /// as a whole before anything is written.
    async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// The `k` nearest records to `vector`. Missing or empty collections yield
    /// an empty result.
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

/// `1 - cos(a, b)`; a zero vector on either side counts as orthogonal.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 1.0;
    }
    (1.0 - dot / denom) as f32
}

/// Scales `vector` to unit length in place. A zero or non-finite norm has no
/// direction and is reported as a bad model response.
pub fn l2_normalize(vector: &mut [f32]) -> Result<()> {
    let norm = vector
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt();
    if !norm.is_finite() || norm <= f64::EPSILON {
        return Err(Error::Model(ProviderError::InvalidResponse(format!(
            "cannot normalise vector with norm {}",
            norm
        ))));
    }
    for v in vector.iter_mut() {
        *v = (f64::from(*v) / norm) as f32;
    }
    Ok(())
}

pub(crate) fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::input("k must be at least 1"));
    }
    Ok(())
}

/// Checks a batch before writing: non-empty finite vectors, one dimension
/// shared with each other and with `existing`. Returns that dimension.
pub(crate) fn validate_batch(records: &[VectorRecord], existing: Option<usize>) -> Result<usize> {
    let mut dimension = existing;
    for record in records {
        if record.id.is_empty() {
            return Err(Error::storage("record id must not be empty"));
        }
        if record.vector.is_empty() {
            return Err(Error::storage(format!("record {} has an empty vector", record.id)));
        }
        if record.vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::storage(format!(
                "record {} contains non-finite values",
                record.id
            )));
        }
        match dimension {
            Some(d) if d != record.vector.len() => {
                return Err(Error::storage(format!(
                    "dimension mismatch for record {}: expected {}, got {}",
                    record.id,
                    d,
                    record.vector.len()
                )))
            }
            _ => dimension = Some(record.vector.len()),
        }
    }
    dimension.ok_or_else(|| Error::storage("empty batch"))
}

pub(crate) fn check_query_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if expected != vector.len() {
        return Err(Error::storage(format!(
            "query dimension {} does not match collection dimension {}",
            vector.len(),
            expected
        )));
    }
    Ok(())
}

/// Ranks candidates given in insertion order: ascending distance, stable on
/// ties, NaN distances last.
pub(crate) fn rank<'a, I>(candidates: I, query: &[f32], k: usize) -> QueryResult
where
    I: IntoIterator<Item = &'a VectorRecord>,
{
    let mut hits: Vec<QueryHit> = candidates
        .into_iter()
        .map(|r| QueryHit {
            id: r.id.clone(),
            payload: r.payload.clone(),
            metadata: r.metadata.clone(),
            distance: cosine_distance(query, &r.vector),
        })
        .collect();
    hits.sort_by(|a, b| compare_distance(a.distance, b.distance));
    hits.truncate(k);
    hits
}

fn compare_distance(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
