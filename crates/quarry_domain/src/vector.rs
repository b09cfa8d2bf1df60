//! Domain models for dense and sparse vectors

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// Hashed term-frequency vector over a fixed vocabulary
///
/// Indices are strictly increasing and bounded by the vectorizer's
/// vocabulary size; values are raw term frequencies (IDF weighting is
/// applied by the store).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Self {
        Self { indices, values }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Check the invariants a well-formed sparse vector must uphold
    pub fn is_well_formed(&self, vocabulary_size: u32) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.windows(2).all(|w| w[0] < w[1])
            && self.indices.iter().all(|&i| i < vocabulary_size)
    }
}

/// Embedding output for one chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingResult {
    pub chunk_id: String,
    pub dense_vector: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_vector: Option<SparseVector>,
}

/// Options for embedding calls
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct EmbedOptions {
    /// Model identifier understood by the embedding backend
    pub model: Option<String>,
    /// Whether to consult and populate the embedding cache
    pub use_cache: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self { model: None, use_cache: true }
    }
}

/// One upsert unit: a chunk together with its vectors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexPoint {
    pub chunk: Chunk,
    pub dense: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<SparseVector>,
}

/// Aggregate counters reported by the vector store for one collection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CollectionStats {
    pub points_count: u64,
    pub indexed_vectors_count: u64,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_sparse_vector_well_formed() {
        let fixture = SparseVector::new(vec![3, 17, 29999], vec![1.0, 2.0, 1.0]);

        assert!(fixture.is_well_formed(30_000));
    }

    #[test]
    fn test_sparse_vector_rejects_unsorted_indices() {
        let fixture = SparseVector::new(vec![17, 3], vec![1.0, 1.0]);

        assert!(!fixture.is_well_formed(30_000));
    }

    #[test]
    fn test_sparse_vector_rejects_out_of_range_index() {
        let fixture = SparseVector::new(vec![30_000], vec![1.0]);

        assert!(!fixture.is_well_formed(30_000));
    }

    #[test]
    fn test_embed_options_defaults() {
        let fixture = EmbedOptions::default();

        let actual = (fixture.model.clone(), fixture.use_cache);
        let expected = (None, true);

        assert_eq!(actual, expected);
    }
}
