//! Environment-driven engine configuration

use std::env;

/// Connection endpoints and identifiers resolved at startup
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Vector store URL (`QDRANT_URL`)
    pub qdrant_url: String,
    /// Embedding backend URL (`OLLAMA_URL`, falling back to `OLLAMA_HOST`)
    pub ollama_url: String,
    /// Collection name (`RLM_COLLECTION`)
    pub collection: String,
    /// Embedding model identifier (`EMBEDDING_MODEL`)
    pub model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            collection: "codebase".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let qdrant_url = env::var("QDRANT_URL").unwrap_or(defaults.qdrant_url);
        let ollama_url = env::var("OLLAMA_URL")
            .or_else(|_| env::var("OLLAMA_HOST"))
            .unwrap_or(defaults.ollama_url);
        let collection = env::var("RLM_COLLECTION").unwrap_or(defaults.collection);
        let model = env::var("EMBEDDING_MODEL").unwrap_or(defaults.model);

        Self { qdrant_url, ollama_url, collection, model }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let fixture = EngineConfig::default();

        assert_eq!(fixture.qdrant_url, "http://localhost:6333");
        assert_eq!(fixture.ollama_url, "http://localhost:11434");
        assert_eq!(fixture.collection, "codebase");
        assert_eq!(fixture.model, "nomic-embed-text");
    }
}
