use sqlx::FromRow;

/// A stored vector row as read back from `vector_records`.
#[derive(Debug, Clone, FromRow)]
pub struct VectorRow {
    pub id: String,
    pub seq: i64,
    pub dim: i64,
    pub vector: Vec<u8>,
    pub payload: String,
    pub metadata_json: String,
}

/// A row to insert or overwrite.
#[derive(Debug, Clone)]
pub struct NewVectorRow {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: String,
    pub metadata_json: String,
}
