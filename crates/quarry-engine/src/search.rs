//! Hybrid retrieval with graceful degradation

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use quarry_domain::{EmbedOptions, SearchFilters, SearchOptions, SearchOutcome, SearchResult};

use crate::embedder::EmbeddingService;
use crate::errors::{EngineError, Result};
use crate::sparse;
use crate::store::VectorStore;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<EmbeddingService>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<EmbeddingService>) -> Self {
        Self { store, embedder }
    }

    /// Retrieval for callers that only want results; the warning is logged
    pub async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        opts: &SearchOptions,
    ) -> Vec<SearchResult> {
        let outcome = self.hybrid_search_with_warning(collection, query, opts).await;
        if let Some(warning) = &outcome.warning {
            warn!(collection, query, warning, "degraded search");
        }
        outcome.results
    }

    /// Retrieval that reports degradation instead of failing
    ///
    /// The whole pipeline (query embedding included) is bounded by
    /// `opts.timeout_ms`; an unreachable store or an elapsed timer yields
    /// an empty result set plus a warning, never an error.
    pub async fn hybrid_search_with_warning(
        &self,
        collection: &str,
        query: &str,
        opts: &SearchOptions,
    ) -> SearchOutcome {
        let deadline = Duration::from_millis(opts.timeout_ms);
        match tokio::time::timeout(deadline, self.run_search(collection, query, opts)).await {
            Ok(Ok(results)) => SearchOutcome::ok(results),
            Ok(Err(EngineError::BackendUnavailable { service, message }))
                if service == "Qdrant" =>
            {
                SearchOutcome::degraded(format!("Qdrant unavailable: {message}"))
            }
            Ok(Err(err)) => {
                error!(collection, query, %err, "search failed");
                SearchOutcome::degraded(format!("Search error: {err}"))
            }
            Err(_) => SearchOutcome::degraded("Search timeout exceeded"),
        }
    }

    /// Metadata-only lookup; at least one filter must be present
    pub async fn search_by_metadata(
        &self,
        collection: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if filters.is_empty() {
            return Err(EngineError::invalid_argument(
                "search_by_metadata requires at least one filter",
            ));
        }
        self.store.scroll(collection, filters, limit).await
    }

    async fn run_search(
        &self,
        collection: &str,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let dense = self
            .embedder
            .embed_text(query, &EmbedOptions::default())
            .await?;

        let results = if opts.use_hybrid {
            let sparse = sparse::vectorize(query);
            self.store
                .query_hybrid(collection, dense, sparse, &opts.filters, opts.limit)
                .await?
        } else {
            self.store
                .query_dense(collection, dense, &opts.filters, opts.limit)
                .await?
        };

        Ok(results
            .into_iter()
            .filter(|r| r.score >= opts.score_threshold)
            .collect())
    }
}
