//! Domain models for the quarry semantic code-search engine

mod chunk;
mod indexing;
mod search;
mod vector;

pub use chunk::{Chunk, ChunkMetadata, SymbolType};
pub use indexing::{IndexOptions, IndexReport};
pub use search::{SearchFilters, SearchOptions, SearchOutcome, SearchResult};
pub use vector::{CollectionStats, EmbedOptions, EmbeddingResult, IndexPoint, SparseVector};
