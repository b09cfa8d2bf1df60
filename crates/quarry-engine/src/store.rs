//! Vector store abstraction and implementations

use async_trait::async_trait;

use quarry_domain::{CollectionStats, IndexPoint, SearchFilters, SearchResult, SparseVector};

use crate::errors::Result;

pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;

mod memory;
mod qdrant;

/// Named dense vector field
pub const DENSE_VECTOR_NAME: &str = "dense";
/// Named sparse vector field, IDF-weighted by the store
pub const SPARSE_VECTOR_NAME: &str = "bm25";
/// Points per upsert request
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Scalar int8 quantization settings
#[derive(Debug, Clone)]
pub struct QuantizationOptions {
    pub quantile: f32,
    pub always_ram: bool,
}

impl Default for QuantizationOptions {
    fn default() -> Self {
        Self { quantile: 0.99, always_ram: true }
    }
}

/// Schema for a collection holding one dense and one sparse field
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Dense vector dimension; must match the embedding model
    pub dimension: usize,
    /// Disabled by default for compatibility with existing collections
    pub quantization: Option<QuantizationOptions>,
}

impl CollectionConfig {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, quantization: None }
    }
}

/// Store operations the engine relies on
///
/// Implementations return typed chunks; untyped payloads never cross
/// this boundary.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing; never modifies an existing one
    async fn ensure_collection(&self, name: &str, config: &CollectionConfig) -> Result<()>;

    /// Patch an existing collection to enable int8 scalar quantization
    async fn enable_quantization(&self, name: &str, opts: &QuantizationOptions) -> Result<()>;

    /// Upsert points in batches, waiting for each batch to be applied
    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()>;

    /// Delete every point whose payload carries `file_hash`
    async fn delete_by_file_hash(&self, name: &str, file_hash: &str) -> Result<()>;

    /// Collection counters, or `None` when the collection is missing
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionStats>>;

    /// RRF fusion over dense and sparse prefetches
    async fn query_hybrid(
        &self,
        name: &str,
        dense: Vec<f32>,
        sparse: SparseVector,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Dense-only nearest-neighbor query
    async fn query_dense(
        &self,
        name: &str,
        dense: Vec<f32>,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Metadata-only scroll; the caller guarantees a non-empty filter
    async fn scroll(
        &self,
        name: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;
}

/// Whether a chunk satisfies every present filter condition
pub(crate) fn chunk_matches_filters(
    chunk: &quarry_domain::Chunk,
    filters: &SearchFilters,
) -> bool {
    if let Some(language) = &filters.language {
        if &chunk.metadata.language != language {
            return false;
        }
    }
    if let Some(symbol_type) = filters.symbol_type {
        if chunk.metadata.symbol_type != symbol_type {
            return false;
        }
    }
    if let Some(path_prefix) = &filters.path_prefix {
        if !chunk.metadata.path.contains(path_prefix.as_str()) {
            return false;
        }
    }
    if let Some(file_hash) = &filters.file_hash {
        if &chunk.metadata.file_hash != file_hash {
            return false;
        }
    }
    true
}
