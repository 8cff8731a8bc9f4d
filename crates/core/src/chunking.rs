use crate::error::IngestError;
use crate::models::{Chunk, Document, RetrievalOptions};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl TryFrom<&RetrievalOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &RetrievalOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

/// A chunk window in char offsets, with its trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Splits `text` into overlapping windows of at most `chunk_size` chars,
/// cutting after a period or newline when one exists past the window midpoint.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<TextWindow> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + config.chunk_size).min(len);

        if end < len {
            let midpoint = start + config.chunk_size / 2;
            let boundary = chars[start..end]
                .iter()
                .rposition(|ch| *ch == '.' || *ch == '\n')
                .map(|offset| start + offset);

            if let Some(position) = boundary {
                if position > midpoint {
                    end = position + 1;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            windows.push(TextWindow {
                start,
                end,
                text: trimmed.to_string(),
            });
        }

        if end >= len {
            break;
        }

        let next = end.saturating_sub(config.overlap);
        start = if next > start { next } else { end };
    }

    windows
}

pub fn chunk_document(document: &Document, config: ChunkingConfig) -> Vec<Chunk> {
    split_text(&document.text, config)
        .into_iter()
        .enumerate()
        .map(|(index, window)| Chunk {
            chunk_id: make_chunk_id(&document.name, index as u64, &window.text),
            document_name: document.name.clone(),
            chunk_index: index as u64,
            start_char: window.start,
            end_char: window.end,
            text: window.text,
        })
        .collect()
}

pub fn chunk_documents(documents: &[Document], config: ChunkingConfig) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|document| chunk_document(document, config))
        .collect()
}

fn make_chunk_id(document_name: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_name.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
