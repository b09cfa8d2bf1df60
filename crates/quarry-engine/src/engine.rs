//! Engine facade wiring configuration, embedding, store and indexer

use std::path::Path;
use std::sync::Arc;

use quarry_domain::{
    CollectionStats, IndexOptions, IndexPoint, IndexReport, SearchFilters, SearchOptions,
    SearchOutcome, SearchResult,
};

use crate::cache::{CacheConfig, CacheStats, EmbeddingCache};
use crate::chunker::Chunker;
use crate::config::EngineConfig;
use crate::embedder::{EmbeddingBackend, EmbeddingService, OllamaBackend};
use crate::errors::Result;
use crate::indexer::Indexer;
use crate::search::Retriever;
use crate::store::{CollectionConfig, QdrantStore, QuantizationOptions, VectorStore};

/// The public programmatic surface of the search engine
pub struct Engine {
    config: EngineConfig,
    embedder: Arc<EmbeddingService>,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    indexer: Indexer,
}

impl Engine {
    /// Assemble an engine from explicit collaborators; tests substitute
    /// in-memory doubles here
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let cache = Arc::new(EmbeddingCache::new(CacheConfig::default()));
        let embedder = Arc::new(EmbeddingService::new(backend, cache, config.model.clone()));
        let retriever = Retriever::new(store.clone(), embedder.clone());
        let indexer = Indexer::new(
            store.clone(),
            embedder.clone(),
            Chunker::default(),
            config.collection.clone(),
        );
        Self { config, embedder, store, retriever, indexer }
    }

    /// Engine against the external services named by the environment
    pub fn from_env() -> Result<Self> {
        let config = EngineConfig::from_env();
        let backend = Arc::new(OllamaBackend::new(config.ollama_url.clone()));
        let store = Arc::new(QdrantStore::connect(&config.qdrant_url)?);
        Ok(Self::new(config, backend, store))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Collection lifecycle

    pub async fn ensure_collection(&self, config: &CollectionConfig) -> Result<()> {
        self.store
            .ensure_collection(&self.config.collection, config)
            .await
    }

    pub async fn enable_quantization(&self, opts: &QuantizationOptions) -> Result<()> {
        self.store
            .enable_quantization(&self.config.collection, opts)
            .await
    }

    pub async fn upsert_points(&self, points: Vec<IndexPoint>) -> Result<()> {
        self.store.upsert(&self.config.collection, points).await
    }

    pub async fn delete_by_file_hash(&self, file_hash: &str) -> Result<()> {
        self.store
            .delete_by_file_hash(&self.config.collection, file_hash)
            .await
    }

    pub async fn get_collection_info(&self) -> Result<Option<CollectionStats>> {
        self.store.collection_info(&self.config.collection).await
    }

    // Indexing

    pub async fn index_directory(&self, root: &Path, opts: &IndexOptions) -> Result<IndexReport> {
        self.indexer.index_directory(root, opts).await
    }

    pub async fn index_single_file(&self, path: &Path, bytes: &[u8]) -> Result<IndexReport> {
        self.indexer.index_single_file(path, bytes).await
    }

    pub fn clear_index_cache(&self) {
        self.indexer.clear_index_cache();
    }

    // Retrieval

    pub async fn hybrid_search(&self, query: &str, opts: &SearchOptions) -> Vec<SearchResult> {
        self.retriever
            .hybrid_search(&self.config.collection, query, opts)
            .await
    }

    pub async fn hybrid_search_with_warning(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> SearchOutcome {
        self.retriever
            .hybrid_search_with_warning(&self.config.collection, query, opts)
            .await
    }

    pub async fn search_by_metadata(
        &self,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.retriever
            .search_by_metadata(&self.config.collection, filters, limit)
            .await
    }

    // Embedding cache

    pub fn get_cache_stats(&self) -> CacheStats {
        self.embedder.cache().stats()
    }

    pub fn get_cache_hit_rate(&self) -> f64 {
        self.embedder.cache().hit_rate()
    }

    pub fn clear_cache(&self) {
        self.embedder.cache().clear();
    }
}
