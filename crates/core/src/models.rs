use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub name: String,
    pub source: String,
    pub text: String,
    pub checksum: String,
    pub loaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: name.into(),
            source: source.into(),
            checksum: crate::ingest::digest_text(&text),
            text,
            loaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_name: String,
    pub chunk_index: u64,
    /// Char offset of the window start in the document text, before trimming.
    pub start_char: usize,
    /// Exclusive char offset of the window end, before trimming.
    pub end_char: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub query: String,
    pub hits: Vec<RetrievedChunk>,
    pub context: String,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Distinct source documents in ranking order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for hit in &self.hits {
            if !sources.contains(&hit.chunk.document_name) {
                sources.push(hit.chunk.document_name.clone());
            }
        }
        sources
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnswerMode {
    Keyword,
    Simulated,
    Retrieval,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub mode: AnswerMode,
    pub text: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VectorizerConfig {
    pub max_features: Option<usize>,
    pub include_bigrams: bool,
    pub remove_stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: Some(5_000),
            include_bigrams: true,
            remove_stop_words: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RetrievalOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub vectorizer: VectorizerConfig,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            top_k: 3,
            max_context_chars: 4_000,
            vectorizer: VectorizerConfig::default(),
        }
    }
}

impl RetrievalOptions {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(IngestError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.max_context_chars == 0 {
            return Err(IngestError::InvalidArgument(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.vectorizer.max_features == Some(0) {
            return Err(IngestError::InvalidArgument(
                "max_features must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(RetrievalOptions::default().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let options = RetrievalOptions {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn sources_are_deduplicated_in_rank_order() {
        let chunk = |name: &str, index: u64| Chunk {
            chunk_id: format!("{name}-{index}"),
            document_name: name.to_string(),
            chunk_index: index,
            start_char: 0,
            end_char: 1,
            text: "x".to_string(),
        };
        let result = QueryResult {
            query: "q".to_string(),
            hits: vec![
                RetrievedChunk { chunk: chunk("b.pdf", 0), score: 0.9 },
                RetrievedChunk { chunk: chunk("a.txt", 0), score: 0.5 },
                RetrievedChunk { chunk: chunk("b.pdf", 1), score: 0.4 },
            ],
            context: String::new(),
        };
        assert_eq!(result.sources(), vec!["b.pdf".to_string(), "a.txt".to_string()]);
    }
}
