//! In-memory vector store for tests and local development
//!
//! Mirrors the Qdrant client's observable behavior: named dense and
//! sparse fields, filterable payload, and RRF fusion over the two
//! rankings.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use quarry_domain::{
    CollectionStats, IndexPoint, SearchFilters, SearchResult, SparseVector,
};

use crate::errors::{EngineError, Result};
use crate::store::{CollectionConfig, QuantizationOptions, VectorStore, chunk_matches_filters};

/// RRF constant: fused score is `Σ 1/(K + rank)` over the rankings
const RRF_K: f32 = 60.0;

struct Collection {
    #[allow(dead_code)]
    config: CollectionConfig,
    quantization: Option<QuantizationOptions>,
    /// Keyed by chunk id; re-upserting a chunk replaces its point
    points: HashMap<String, IndexPoint>,
}

#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Collection) -> T,
    ) -> Result<T> {
        let collections = self.collections.lock().expect("store mutex poisoned");
        let collection = collections
            .get(name)
            .ok_or_else(|| EngineError::backend_error("memory store", format!("collection `{name}` not found")))?;
        Ok(f(collection))
    }

    /// Points currently stored for a file hash; test helper
    pub fn points_with_file_hash(&self, name: &str, file_hash: &str) -> usize {
        self.with_collection(name, |c| {
            c.points
                .values()
                .filter(|p| p.chunk.metadata.file_hash == file_hash)
                .count()
        })
        .unwrap_or(0)
    }

    /// Whether quantization has been enabled on a collection; test helper
    pub fn quantization_enabled(&self, name: &str) -> bool {
        self.with_collection(name, |c| c.quantization.is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, name: &str, config: &CollectionConfig) -> Result<()> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        collections.entry(name.to_string()).or_insert_with(|| Collection {
            config: config.clone(),
            quantization: config.quantization.clone(),
            points: HashMap::new(),
        });
        Ok(())
    }

    async fn enable_quantization(&self, name: &str, opts: &QuantizationOptions) -> Result<()> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| EngineError::backend_error("memory store", format!("collection `{name}` not found")))?;
        collection.quantization = Some(opts.clone());
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| EngineError::backend_error("memory store", format!("collection `{name}` not found")))?;
        for point in points {
            collection.points.insert(point.chunk.id.clone(), point);
        }
        Ok(())
    }

    async fn delete_by_file_hash(&self, name: &str, file_hash: &str) -> Result<()> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        if let Some(collection) = collections.get_mut(name) {
            collection
                .points
                .retain(|_, p| p.chunk.metadata.file_hash != file_hash);
        }
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionStats>> {
        let collections = self.collections.lock().expect("store mutex poisoned");
        Ok(collections.get(name).map(|c| CollectionStats {
            points_count: c.points.len() as u64,
            indexed_vectors_count: c.points.len() as u64,
        }))
    }

    async fn query_hybrid(
        &self,
        name: &str,
        dense: Vec<f32>,
        sparse: SparseVector,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.with_collection(name, |collection| {
            let candidates: Vec<&IndexPoint> = collection
                .points
                .values()
                .filter(|p| chunk_matches_filters(&p.chunk, filters))
                .collect();

            let prefetch = limit * 2;
            let dense_ranked = rank_by(&candidates, prefetch, |p| {
                cosine_similarity(&dense, &p.dense)
            });
            let sparse_ranked = rank_by(&candidates, prefetch, |p| {
                p.sparse
                    .as_ref()
                    .map(|s| sparse_dot(&sparse, s))
                    .unwrap_or(0.0)
            });

            // Reciprocal rank fusion over the two prefetch rankings
            let mut fused: HashMap<&str, f32> = HashMap::new();
            for ranking in [&dense_ranked, &sparse_ranked] {
                for (rank, id) in ranking.iter().enumerate() {
                    *fused.entry(id.as_str()).or_insert(0.0) += 1.0 / (RRF_K + rank as f32 + 1.0);
                }
            }

            let mut scored: Vec<(String, f32)> = fused
                .into_iter()
                .map(|(id, score)| (id.to_string(), score))
                .collect();
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });

            scored
                .into_iter()
                .take(limit)
                .filter_map(|(id, score)| {
                    collection.points.get(&id).map(|p| SearchResult {
                        id: id.clone(),
                        score,
                        chunk: p.chunk.clone(),
                    })
                })
                .collect()
        })
    }

    async fn query_dense(
        &self,
        name: &str,
        dense: Vec<f32>,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.with_collection(name, |collection| {
            let mut scored: Vec<(&IndexPoint, f32)> = collection
                .points
                .values()
                .filter(|p| chunk_matches_filters(&p.chunk, filters))
                .map(|p| (p, cosine_similarity(&dense, &p.dense)))
                .collect();
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.chunk.id.cmp(&b.0.chunk.id))
            });
            scored
                .into_iter()
                .take(limit)
                .map(|(p, score)| SearchResult {
                    id: p.chunk.id.clone(),
                    score,
                    chunk: p.chunk.clone(),
                })
                .collect()
        })
    }

    async fn scroll(
        &self,
        name: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.with_collection(name, |collection| {
            let mut matches: Vec<&IndexPoint> = collection
                .points
                .values()
                .filter(|p| chunk_matches_filters(&p.chunk, filters))
                .collect();
            matches.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
            matches
                .into_iter()
                .take(limit)
                .map(|p| SearchResult { id: p.chunk.id.clone(), score: 1.0, chunk: p.chunk.clone() })
                .collect()
        })
    }
}

/// Ids of the top `limit` candidates under `score`, best first
fn rank_by(
    candidates: &[&IndexPoint],
    limit: usize,
    score: impl Fn(&IndexPoint) -> f32,
) -> Vec<String> {
    let mut scored: Vec<(&str, f32)> = candidates
        .iter()
        .map(|&p| (p.chunk.id.as_str(), score(p)))
        .filter(|(_, s)| *s > 0.0)
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    scored.into_iter().take(limit).map(|(id, _)| id.to_string()).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Dot product over matching sparse indices
fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let mut score = 0.0;
    let mut i = 0;
    let mut j = 0;
    while i < a.indices.len() && j < b.indices.len() {
        match a.indices[i].cmp(&b.indices[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                score += a.values[i] * b.values[j];
                i += 1;
                j += 1;
            }
        }
    }
    score
}
