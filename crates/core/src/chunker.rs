use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::TextChunk;

/// Sliding-window splitter. Windows are measured in characters and prefer to
/// end on whitespace; consecutive windows on a page share `overlap`
/// characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 || overlap >= size {
            return Err(Error::input(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn from_config(cfg: &ChunkingConfig) -> Result<Self> {
        Self::new(cfg.chunk_size, cfg.chunk_overlap)
    }

    /// Splits every page, numbering chunks across the whole document.
    pub fn split_pages(&self, pages: &[String]) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        for (page, text) in pages.iter().enumerate() {
            for piece in self.split(text) {
                let ordinal = chunks.len();
                chunks.push(TextChunk::new(piece, page, ordinal));
            }
        }
        chunks
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = (start + self.size).min(chars.len());
            if end < chars.len() {
                // Break at the last whitespace that still leaves room for the overlap.
                if let Some(ws) = (start + self.overlap + 1..end)
                    .rev()
                    .find(|&i| chars[i].is_whitespace())
                {
                    end = ws;
                }
            }
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                out.push(piece.to_string());
            }
            if end >= chars.len() {
                break;
            }
            start = end - self.overlap;
        }
        out
    }
}
