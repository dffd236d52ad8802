//! Document loading: raw file to page texts.

use crate::chunker::Chunker;
use crate::error::{Error, Result};
use crate::models::TextChunk;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::debug;

/// Page break honoured in plain text files.
const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub pages: Vec<String>,
    pub chunks: Vec<TextChunk>,
}

impl LoadedDocument {
    /// Text the classifier sees.
    pub fn first_page(&self) -> &str {
        self.pages.first().map(String::as_str).unwrap_or_default()
    }
}

#[async_trait::async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedDocument>;
}

/// Reads plain text and markdown directly and PDFs through `pdf-extract`
/// when the `pdf` feature is enabled, then splits the pages into chunks.
#[derive(Debug, Clone, Copy)]
pub struct TextLoader {
    chunker: Chunker,
}

impl TextLoader {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    Text,
}

#[async_trait::async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let path = path.to_path_buf();
        let chunker = self.chunker;
        task::spawn_blocking(move || load_blocking(path, chunker))
            .await
            .map_err(|e| Error::input(format!("loader task failed: {}", e)))?
    }
}

fn load_blocking(path: PathBuf, chunker: Chunker) -> Result<LoadedDocument> {
    let format = detect_format(&path)?;
    let pages = match format {
        Format::Text => {
            let bytes = fs::read(&path)
                .map_err(|e| Error::input(format!("reading {}: {}", path.display(), e)))?;
            String::from_utf8_lossy(&bytes)
                .split(PAGE_BREAK)
                .map(str::to_string)
                .collect()
        }
        Format::Pdf => pdf_pages(&path)?,
    };
    if pages.iter().all(|p| p.trim().is_empty()) {
        return Err(Error::input(format!("{} has no extractable text", path.display())));
    }
    let chunks = chunker.split_pages(&pages);
    debug!(path = %path.display(), pages = pages.len(), chunks = chunks.len(), "loaded document");
    Ok(LoadedDocument {
        path,
        pages,
        chunks,
    })
}

fn detect_format(path: &Path) -> Result<Format> {
    if !path.is_file() {
        return Err(Error::input(format!("{} is not a file", path.display())));
    }
    let sniffed = infer::get_from_path(path)
        .map_err(|e| Error::input(format!("reading {}: {}", path.display(), e)))?;
    if let Some(kind) = sniffed {
        if kind.mime_type() == "application/pdf" {
            return Ok(Format::Pdf);
        }
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(Format::Pdf),
        "txt" | "md" | "markdown" | "text" => Ok(Format::Text),
        _ => Err(Error::input(format!(
            "unsupported document type: {}",
            path.display()
        ))),
    }
}

/// One string per PDF page, in page order.
#[cfg(feature = "pdf")]
fn pdf_pages(path: &Path) -> Result<Vec<String>> {
    pdf_extract::extract_text_by_pages(path)
        .map_err(|e| Error::input(format!("extracting {}: {}", path.display(), e)))
}

#[cfg(not(feature = "pdf"))]
fn pdf_pages(path: &Path) -> Result<Vec<String>> {
    Err(Error::input(format!(
        "{}: built without PDF support (enable the `pdf` feature)",
        path.display()
    )))
}
