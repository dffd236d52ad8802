//! Embeds documents and images and keeps them in the two index collections.

use crate::error::{Error, Result};
use crate::models::{keys, Collection, QueryResult, TextChunk, VectorRecord};
use crate::vectorstore::{l2_normalize, VectorStore};
use chrono::Utc;
use image::ImageOutputFormat;
use providers::{EmbeddingProvider, ImageEmbeddingProvider, ImageInput, ProviderError};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info};

pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    text: Arc<dyn EmbeddingProvider>,
    images: Option<Arc<dyn ImageEmbeddingProvider>>,
    text_collection: String,
    image_collection: String,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, text: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            text,
            images: None,
            text_collection: Collection::Text.to_string(),
            image_collection: Collection::Image.to_string(),
            batch_size: 64,
        }
    }

    pub fn with_images(mut self, provider: Arc<dyn ImageEmbeddingProvider>) -> Self {
        self.images = Some(provider);
        self
    }

    pub fn with_collections(mut self, text: impl Into<String>, image: impl Into<String>) -> Self {
        self.text_collection = text.into();
        self.image_collection = image.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection_name(&self, collection: Collection) -> &str {
        match collection {
            Collection::Text => &self.text_collection,
            Collection::Image => &self.image_collection,
        }
    }

    pub fn image_provider(&self) -> Result<Arc<dyn ImageEmbeddingProvider>> {
        self.images
            .clone()
            .ok_or_else(|| Error::Config("no image embedding provider configured".into()))
    }

    /// Stores `records` as given, except that image vectors are scaled to unit
    /// length first. A zero image vector fails the whole batch.
    pub async fn add(&self, collection: Collection, mut records: Vec<VectorRecord>) -> Result<()> {
        if collection == Collection::Image {
            for record in records.iter_mut() {
                l2_normalize(&mut record.vector)?;
            }
        }
        self.store.add(self.collection_name(collection), records).await
    }

    pub async fn query(&self, collection: Collection, vector: &[f32], k: usize) -> Result<QueryResult> {
        self.store.query(self.collection_name(collection), vector, k).await
    }

    pub async fn count(&self, collection: Collection) -> Result<usize> {
        self.store.count(self.collection_name(collection)).await
    }

    /// Embeds and stores categorised chunks. Nothing is written unless every
    /// chunk embeds.
    pub async fn index_document(&self, chunks: &[TextChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        for chunk in chunks {
            if chunk.category().map(str::trim).unwrap_or_default().is_empty() {
                return Err(Error::input(format!(
                    "chunk {} of {} has no category",
                    chunk.ordinal,
                    chunk.source().unwrap_or("<unknown>")
                )));
            }
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let resp = self.text.embed(&texts).await?;
            if resp.vectors.len() != texts.len() {
                return Err(Error::Model(ProviderError::InvalidResponse(format!(
                    "{} vectors returned for {} chunks",
                    resp.vectors.len(),
                    texts.len()
                ))));
            }
            vectors.extend(resp.vectors);
        }

        let indexed_at = Utc::now().to_rfc3339();
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut metadata = chunk.metadata.clone();
                metadata.insert(keys::PAGE.to_string(), chunk.page.to_string());
                metadata.insert(keys::ORDINAL.to_string(), chunk.ordinal.to_string());
                metadata.insert(keys::INDEXED_AT.to_string(), indexed_at.clone());
                VectorRecord {
                    id: chunk_id(chunk),
                    vector,
                    payload: chunk.content.clone(),
                    metadata,
                }
            })
            .collect();
        let count = records.len();
        self.add(Collection::Text, records).await?;
        info!(chunks = count, source = chunks[0].source().unwrap_or_default(), "indexed document");
        Ok(count)
    }

    /// Decodes, embeds and stores one picture under its file name.
    pub async fn index_image(&self, path: &Path) -> Result<()> {
        let provider = self.image_provider()?;
        let input = load_image(path).await?;
        let resp = provider.embed_images(&[input]).await?;
        let vector = resp.vectors.into_iter().next().ok_or_else(|| {
            Error::Model(ProviderError::InvalidResponse("no image vector returned".into()))
        })?;

        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::input(format!("{} has no file name", path.display())))?;
        let location = path.to_string_lossy().into_owned();
        let record = VectorRecord {
            id,
            vector,
            payload: location.clone(),
            metadata: [(keys::FILE_PATH.to_string(), location)].into_iter().collect(),
        };
        self.add(Collection::Image, vec![record]).await?;
        debug!(path = %path.display(), "indexed image");
        Ok(())
    }

    pub async fn search_text(&self, query: &str, k: usize) -> Result<QueryResult> {
        if query.trim().is_empty() {
            return Err(Error::input("search query must not be empty"));
        }
        let vector = self.text.embed_one(query).await?;
        self.query(Collection::Text, &vector, k).await
    }
}

/// Stable id for a chunk: same source, position and content give the same id.
fn chunk_id(chunk: &TextChunk) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(chunk.source().unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(chunk.page.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(chunk.ordinal.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(chunk.content.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Reads an image and re-encodes it as RGB PNG for the embedding backend.
async fn load_image(path: &Path) -> Result<ImageInput> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::input(format!("reading {}: {}", path.display(), e)))?;
    if !infer::is_image(&bytes) {
        return Err(Error::input(format!("{} is not an image", path.display())));
    }
    let display = path.display().to_string();
    task::spawn_blocking(move || -> Result<ImageInput> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| Error::input(format!("decoding {}: {}", display, e)))?;
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
        let mut png = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| Error::input(format!("encoding {}: {}", display, e)))?;
        Ok(ImageInput {
            bytes: png,
            mime: "image/png".to_string(),
        })
    })
    .await
    .map_err(|e| Error::input(format!("image task failed: {}", e)))?
}
