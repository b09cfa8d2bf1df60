//! Domain models for hybrid retrieval

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, SymbolType};

/// Metadata conditions applied as a conjunction
#[derive(Debug, Clone, Serialize, Deserialize, Setters, Default, PartialEq)]
#[setters(strip_option, into)]
pub struct SearchFilters {
    /// Exact match on the chunk language
    pub language: Option<String>,
    /// Exact match on the symbol kind
    pub symbol_type: Option<SymbolType>,
    /// Text-contains match on the chunk path
    pub path_prefix: Option<String>,
    /// Exact match on the file content hash
    pub file_hash: Option<String>,
}

impl SearchFilters {
    /// True when no condition is present
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.symbol_type.is_none()
            && self.path_prefix.is_none()
            && self.file_hash.is_none()
    }
}

/// Options for one retrieval call
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct SearchOptions {
    /// Maximum number of results to return
    pub limit: usize,
    /// Results scoring below this are dropped
    pub score_threshold: f32,
    pub filters: SearchFilters,
    /// Fuse dense and sparse retrieval with RRF; dense-only when false
    pub use_hybrid: bool,
    /// Upper bound on the whole retrieval pipeline
    pub timeout_ms: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            score_threshold: 0.0,
            filters: SearchFilters::default(),
            use_hybrid: true,
            timeout_ms: 5_000,
        }
    }
}

/// One retrieved chunk with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Logical chunk id from the payload, or the store's point id
    pub id: String,
    pub score: f32,
    pub chunk: Chunk,
}

/// Retrieval output for degradation-aware callers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// Present when the store was unreachable or the call degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SearchOutcome {
    pub fn ok(results: Vec<SearchResult>) -> Self {
        Self { results, warning: None }
    }

    pub fn degraded(warning: impl Into<String>) -> Self {
        Self { results: Vec::new(), warning: Some(warning.into()) }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_search_options_defaults() {
        let fixture = SearchOptions::default();

        assert_eq!(fixture.limit, 10);
        assert_eq!(fixture.score_threshold, 0.0);
        assert_eq!(fixture.timeout_ms, 5_000);
        assert!(fixture.use_hybrid);
        assert!(fixture.filters.is_empty());
    }

    #[test]
    fn test_filters_builder() {
        let fixture = SearchFilters::default()
            .language("typescript")
            .symbol_type(SymbolType::Function)
            .path_prefix("src/");

        assert!(!fixture.is_empty());
        assert_eq!(fixture.language, Some("typescript".to_string()));
        assert_eq!(fixture.symbol_type, Some(SymbolType::Function));
        assert_eq!(fixture.file_hash, None);
    }

    #[test]
    fn test_degraded_outcome_has_no_results() {
        let fixture = SearchOutcome::degraded("Qdrant unavailable: connection refused");

        assert!(fixture.results.is_empty());
        assert_eq!(
            fixture.warning.as_deref(),
            Some("Qdrant unavailable: connection refused")
        );
    }
}
