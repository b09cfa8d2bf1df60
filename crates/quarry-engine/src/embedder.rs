//! Embedding client with pluggable backends and cache-aware batching

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use quarry_domain::{Chunk, EmbedOptions, EmbeddingResult};

use crate::cache::EmbeddingCache;
use crate::errors::{EngineError, Result};
use crate::sparse;

/// Transport to an embedding model server
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed `texts` with `model`, one output row per input, same order
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama-compatible HTTP backend (`POST {url}/api/embed`)
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": model,
            "input": texts,
            // Over-long inputs are truncated by the backend
            "truncate": true,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EngineError::backend_error(
                "embedding backend",
                format!("{status}: {detail}"),
            ));
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EngineError::backend_error(
                "embedding backend",
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            ));
        }
        if parsed.embeddings.iter().any(|v| v.is_empty()) {
            return Err(EngineError::backend_error(
                "embedding backend",
                "backend returned an empty embedding row",
            ));
        }

        Ok(parsed.embeddings)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Deterministic hash-based backend for tests and offline development
///
/// Dimensions are read off a SHA-256 counter stream over the input
/// text, mapped into `[-1, 1)`. Not semantic; stable across runs.
/// Cosine scoring is scale-invariant, so the raw stream needs no
/// normalization.
pub struct HashBackend {
    dimension: usize,
}

impl HashBackend {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let mut vector = Vec::with_capacity(self.dimension);
        let mut block: u32 = 0;
        while vector.len() < self.dimension {
            let digest = Sha256::new()
                .chain_update(text.as_bytes())
                .chain_update(block.to_be_bytes())
                .finalize();
            for word in digest.chunks_exact(4) {
                if vector.len() == self.dimension {
                    break;
                }
                let raw = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
                vector.push((raw as f64 / (u32::MAX as f64 + 1.0) * 2.0 - 1.0) as f32);
            }
            block += 1;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for HashBackend {
    async fn embed(&self, _model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Cache-aware embedding service
///
/// Every call consults the cache first (keyed by SHA-256 of the exact
/// text); all misses of one call go to the backend in a single batch
/// that preserves input positions.
pub struct EmbeddingService {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<EmbeddingCache>,
    default_model: String,
}

impl EmbeddingService {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        cache: Arc<EmbeddingCache>,
        default_model: impl Into<String>,
    ) -> Self {
        Self { backend, cache, default_model: default_model.into() }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    fn model<'a>(&'a self, opts: &'a EmbedOptions) -> &'a str {
        opts.model.as_deref().unwrap_or(&self.default_model)
    }

    pub async fn embed_text(&self, text: &str, opts: &EmbedOptions) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts, opts).await?;
        vectors.pop().ok_or_else(|| {
            EngineError::backend_error(self.backend.name(), "no embedding returned")
        })
    }

    /// Embed `texts`, preserving input order in the output
    pub async fn embed_batch(&self, texts: &[String], opts: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model(opts);
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut miss_positions = Vec::new();

        if opts.use_cache {
            for (position, text) in texts.iter().enumerate() {
                match self.cache.get(text) {
                    Some(vector) => slots[position] = Some(vector),
                    None => miss_positions.push(position),
                }
            }
        } else {
            miss_positions.extend(0..texts.len());
        }

        if !miss_positions.is_empty() {
            let miss_texts: Vec<String> =
                miss_positions.iter().map(|&p| texts[p].clone()).collect();
            debug!(
                total = texts.len(),
                misses = miss_texts.len(),
                model,
                "dispatching embedding batch"
            );
            let produced = self.backend.embed(model, &miss_texts).await?;
            if produced.len() != miss_texts.len() {
                return Err(EngineError::backend_error(
                    self.backend.name(),
                    format!(
                        "expected {} embeddings, got {}",
                        miss_texts.len(),
                        produced.len()
                    ),
                ));
            }
            for (&position, vector) in miss_positions.iter().zip(produced) {
                if opts.use_cache {
                    self.cache.set(&texts[position], vector.clone());
                }
                slots[position] = Some(vector);
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.expect("every slot is filled by cache or backend"))
            .collect())
    }

    /// Embed chunks, attaching dense and sparse vectors per chunk
    pub async fn embed_chunks(
        &self,
        chunks: &[Chunk],
        opts: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let dense = self.embed_batch(&texts, opts).await?;

        Ok(chunks
            .iter()
            .zip(dense)
            .map(|(chunk, dense_vector)| EmbeddingResult {
                chunk_id: chunk.id.clone(),
                dense_vector,
                sparse_vector: Some(sparse::vectorize(&chunk.text)),
            })
            .collect())
    }
}
