//! Quarry - local semantic code search over a Qdrant collection
//!
//! Chunks source and markdown files into symbol-bounded fragments,
//! embeds them through a caching client, and answers natural-language
//! queries with RRF-fused dense + sparse retrieval.

pub mod cache;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod format;
pub mod indexer;
pub mod logging;
pub mod search;
pub mod sparse;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheConfig, CacheStats, EmbeddingCache};
pub use chunker::{Chunker, CodeChunkerConfig, MarkdownChunkerConfig};
pub use config::EngineConfig;
pub use embedder::{EmbeddingBackend, EmbeddingService, HashBackend, OllamaBackend};
pub use engine::Engine;
pub use errors::{EngineError, Result};
pub use format::{FormattedResult, MAX_LINES_PER_RESULT, format_results, render_markdown};
pub use indexer::Indexer;
pub use logging::{LoggingConfig, init_default_logging};
pub use search::Retriever;
pub use store::{
    CollectionConfig, InMemoryStore, QdrantStore, QuantizationOptions, VectorStore,
};
