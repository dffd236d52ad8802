use crate::models::{NewVectorRow, VectorRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

/// Upserts `rows` into `collection` inside one transaction. Existing ids keep
/// their `seq`; new ids are appended after the current maximum. The first
/// stored row fixes the collection's dimension, checked inside the same
/// transaction.
pub async fn upsert_rows(
    pool: &SqlitePool,
    collection: &str,
    rows: &[NewVectorRow],
) -> anyhow::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    if let Some(dim) = collection_dimension(&mut *tx, collection).await? {
        if let Some(row) = rows.iter().find(|r| r.vector.len() != dim) {
            anyhow::bail!(
                "dimension mismatch for record {}: collection {} holds {}-d vectors, got {}",
                row.id,
                collection,
                dim,
                row.vector.len()
            );
        }
    }
    let max_seq: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(seq), 0) FROM vector_records WHERE collection = ?1",
    )
    .bind(collection)
    .fetch_one(&mut *tx)
    .await?;

    for (offset, row) in rows.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO vector_records (collection, id, seq, dim, vector, payload, metadata_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(collection, id) DO UPDATE SET
                dim=excluded.dim,
                vector=excluded.vector,
                payload=excluded.payload,
                metadata_json=excluded.metadata_json,
                updated_at=strftime('%s','now')
            "#,
        )
        .bind(collection)
        .bind(&row.id)
        .bind(max_seq + 1 + offset as i64)
        .bind(row.vector.len() as i64)
        .bind(encode_vector(&row.vector))
        .bind(&row.payload)
        .bind(&row.metadata_json)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    debug!(collection, rows = rows.len(), "upserted vector rows");
    Ok(())
}

/// All rows of `collection` in insertion order.
pub async fn load_rows(pool: &SqlitePool, collection: &str) -> anyhow::Result<Vec<VectorRow>> {
    let rows = sqlx::query_as::<_, VectorRow>(
        "SELECT id, seq, dim, vector, payload, metadata_json FROM vector_records WHERE collection = ?1 ORDER BY seq",
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Dimension of the first stored vector, if the collection has any rows.
pub async fn collection_dimension(
    conn: &mut SqliteConnection,
    collection: &str,
) -> anyhow::Result<Option<usize>> {
    let row = sqlx::query("SELECT dim FROM vector_records WHERE collection = ?1 ORDER BY seq LIMIT 1")
        .bind(collection)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| r.get::<i64, _>(0) as usize))
}

pub async fn count_rows(pool: &SqlitePool, collection: &str) -> anyhow::Result<usize> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE collection = ?1")
            .bind(collection)
            .fetch_one(pool)
            .await?;
    Ok(count as usize)
}

/// Little-endian f32 blob.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_vector(blob: &[u8]) -> anyhow::Result<Vec<f32>> {
    anyhow::ensure!(
        blob.len() % 4 == 0,
        "vector blob length {} is not a multiple of 4",
        blob.len()
    );
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect, migrate};

    fn row(id: &str, vector: Vec<f32>, payload: &str) -> NewVectorRow {
        NewVectorRow {
            id: id.to_string(),
            vector,
            payload: payload.to_string(),
            metadata_json: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn overwrite_keeps_original_sequence() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();

        upsert_rows(&pool, "text", &[row("a", vec![1.0, 0.0], "first"), row("b", vec![0.0, 1.0], "second")])
            .await
            .unwrap();
        upsert_rows(&pool, "text", &[row("a", vec![0.5, 0.5], "replaced")])
            .await
            .unwrap();

        let rows = load_rows(&pool, "text").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a");
        assert_eq!(rows[0].payload, "replaced");
        assert_eq!(decode_vector(&rows[0].vector).unwrap(), vec![0.5, 0.5]);
        assert_eq!(count_rows(&pool, "image").await.unwrap(), 0);
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(collection_dimension(&mut conn, "text").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn mismatched_dimension_writes_nothing() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();

        upsert_rows(&pool, "image", &[row("a", vec![1.0, 0.0], "a.png")])
            .await
            .unwrap();
        let err = upsert_rows(
            &pool,
            "image",
            &[row("b", vec![0.0, 1.0], "b.png"), row("c", vec![1.0, 0.0, 0.0], "c.png")],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
        assert_eq!(count_rows(&pool, "image").await.unwrap(), 1);
        assert_eq!(count_rows(&pool, "text").await.unwrap(), 0);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(decode_vector(&[0, 0, 128]).is_err());
        let v = vec![1.5f32, -2.0];
        assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
    }
}
