use crate::error::IndexError;
use crate::models::{Chunk, VectorizerConfig};
use crate::vectorizer::{SparseVector, TfidfVectorizer};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Fitted vectorizer plus one vector per chunk.
///
/// Built once and never mutated: queries are always vectorized with the
/// vectorizer the chunk vectors were produced by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkIndex {
    vectorizer: TfidfVectorizer,
    chunks: Vec<Chunk>,
    vectors: Vec<SparseVector>,
}

impl ChunkIndex {
    pub fn build(chunks: Vec<Chunk>, config: &VectorizerConfig) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&texts, config);
        if vectorizer.vocabulary_size() == 0 {
            return Err(IndexError::EmptyVocabulary {
                chunks: chunks.len(),
            });
        }

        let vectors: Vec<SparseVector> = texts
            .iter()
            .map(|text| vectorizer.transform(text))
            .collect();

        debug!(
            chunks = chunks.len(),
            vocabulary = vectorizer.vocabulary_size(),
            "built chunk index"
        );

        Ok(Self {
            vectorizer,
            chunks,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    /// One vector per chunk, and every vector term is in the vocabulary.
    pub(crate) fn is_consistent(&self) -> bool {
        let vocabulary = self.vectorizer.vocabulary_size();
        self.vectorizer.is_consistent()
            && self.vectors.len() == self.chunks.len()
            && self.vectors.iter().all(|vector| {
                vector
                    .entries()
                    .iter()
                    .all(|(term_id, _)| (*term_id as usize) < vocabulary)
            })
    }

    /// Up to `k` chunks ordered by ascending cosine distance to `query`.
    pub fn nearest(&self, query: &str, k: usize) -> Vec<Neighbor> {
        let query_vector = self.vectorizer.transform(query);

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: query_vector.cosine_distance(vector),
            })
            .collect();

        neighbors.sort_by(|left, right| {
            left.distance
                .total_cmp(&right.distance)
                .then(left.position.cmp(&right.position))
        });
        neighbors.truncate(k.min(self.chunks.len()));
        neighbors
    }
}
