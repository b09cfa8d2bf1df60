//! Qdrant-backed vector store

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, Fusion,
    HnswConfigDiffBuilder, Modifier, NamedVectors, PointStruct, PrefetchQueryBuilder,
    QuantizationType, Query, QueryPointsBuilder, ScalarQuantization,
    ScalarQuantizationBuilder, ScrollPointsBuilder, SparseVectorParamsBuilder,
    SparseVectorsConfigBuilder, UpdateCollectionBuilder, UpsertPointsBuilder, Value, Vector,
    VectorInput, VectorParamsBuilder, VectorsConfigBuilder, quantization_config_diff,
    value::Kind,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};

use quarry_domain::{
    Chunk, ChunkMetadata, CollectionStats, IndexPoint, SearchFilters, SearchResult, SparseVector,
    SymbolType,
};

use crate::errors::Result;
use crate::store::{
    CollectionConfig, DENSE_VECTOR_NAME, QuantizationOptions, SPARSE_VECTOR_NAME,
    UPSERT_BATCH_SIZE, VectorStore,
};

const HNSW_M: u64 = 16;
const HNSW_EF_CONSTRUCT: u64 = 100;

pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, config: &CollectionConfig) -> Result<()> {
        if self.client.collection_exists(name).await? {
            debug!(collection = name, "collection already exists");
            return Ok(());
        }

        let mut vectors = VectorsConfigBuilder::default();
        vectors.add_named_vector_params(
            DENSE_VECTOR_NAME,
            VectorParamsBuilder::new(config.dimension as u64, Distance::Cosine),
        );

        let mut sparse_vectors = SparseVectorsConfigBuilder::default();
        sparse_vectors.add_named_vector_params(
            SPARSE_VECTOR_NAME,
            SparseVectorParamsBuilder::default().modifier(Modifier::Idf),
        );

        let mut request = CreateCollectionBuilder::new(name)
            .vectors_config(vectors)
            .sparse_vectors_config(sparse_vectors)
            .hnsw_config(
                HnswConfigDiffBuilder::default()
                    .m(HNSW_M)
                    .ef_construct(HNSW_EF_CONSTRUCT),
            );

        if let Some(quantization) = &config.quantization {
            request = request.quantization_config(
                ScalarQuantizationBuilder::default()
                    .r#type(QuantizationType::Int8.into())
                    .quantile(quantization.quantile)
                    .always_ram(quantization.always_ram),
            );
        }

        self.client.create_collection(request).await?;
        info!(collection = name, dimension = config.dimension, "collection created");
        Ok(())
    }

    async fn enable_quantization(&self, name: &str, opts: &QuantizationOptions) -> Result<()> {
        let diff = quantization_config_diff::Quantization::Scalar(ScalarQuantization {
            r#type: QuantizationType::Int8.into(),
            quantile: Some(opts.quantile),
            always_ram: Some(opts.always_ram),
        });
        self.client
            .update_collection(UpdateCollectionBuilder::new(name).quantization_config(diff))
            .await?;
        info!(collection = name, "int8 quantization enabled");
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()> {
        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let structs: Vec<PointStruct> = batch
                .iter()
                .map(|point| {
                    let mut vectors = NamedVectors::default()
                        .add_vector(DENSE_VECTOR_NAME, Vector::new_dense(point.dense.clone()));
                    if let Some(sparse) = &point.sparse {
                        vectors = vectors.add_vector(
                            SPARSE_VECTOR_NAME,
                            Vector::new_sparse(sparse.indices.clone(), sparse.values.clone()),
                        );
                    }
                    // Point ids are synthesized per upsert; the stable
                    // identity is the chunk_id in the payload
                    PointStruct::new(
                        uuid::Uuid::new_v4().to_string(),
                        vectors,
                        Payload::from(build_payload(&point.chunk)),
                    )
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(name, structs).wait(true))
                .await?;
        }
        Ok(())
    }

    async fn delete_by_file_hash(&self, name: &str, file_hash: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(name)
                    .points(Filter::must([Condition::matches(
                        "file_hash",
                        file_hash.to_string(),
                    )]))
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionStats>> {
        if !self.client.collection_exists(name).await? {
            return Ok(None);
        }
        let info = self.client.collection_info(name).await?;
        Ok(info.result.map(|r| CollectionStats {
            points_count: r.points_count.unwrap_or(0),
            indexed_vectors_count: r.indexed_vectors_count.unwrap_or(0),
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
        let filter = build_filter(filters);
        let prefetch_limit = (limit * 2) as u64;

        let mut dense_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(dense))
            .using(DENSE_VECTOR_NAME)
            .limit(prefetch_limit);
        let mut sparse_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(VectorInput::new_sparse(
                sparse.indices,
                sparse.values,
            )))
            .using(SPARSE_VECTOR_NAME)
            .limit(prefetch_limit);
        if let Some(filter) = &filter {
            dense_prefetch = dense_prefetch.filter(filter.clone());
            sparse_prefetch = sparse_prefetch.filter(filter.clone());
        }

        let response = self
            .client
            .query(
                QueryPointsBuilder::new(name)
                    .add_prefetch(dense_prefetch)
                    .add_prefetch(sparse_prefetch)
                    .query(Query::new_fusion(Fusion::Rrf))
                    .limit(limit as u64)
                    .with_payload(true),
            )
            .await?;

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let fallback_id = point
                    .id
                    .as_ref()
                    .map(point_id_string)
                    .unwrap_or_default();
                scored_result(point.payload, point.score, fallback_id)
            })
            .collect())
    }

    async fn query_dense(
        &self,
        name: &str,
        dense: Vec<f32>,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut request = QueryPointsBuilder::new(name)
            .query(Query::new_nearest(dense))
            .using(DENSE_VECTOR_NAME)
            .limit(limit as u64)
            .with_payload(true);
        if let Some(filter) = build_filter(filters) {
            request = request.filter(filter);
        }

        let response = self.client.query(request).await?;
        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let fallback_id = point
                    .id
                    .as_ref()
                    .map(point_id_string)
                    .unwrap_or_default();
                scored_result(point.payload, point.score, fallback_id)
            })
            .collect())
    }

    async fn scroll(
        &self,
        name: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut request = ScrollPointsBuilder::new(name)
            .limit(limit as u32)
            .with_payload(true);
        if let Some(filter) = build_filter(filters) {
            request = request.filter(filter);
        }

        let response = self.client.scroll(request).await?;
        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let fallback_id = point
                    .id
                    .as_ref()
                    .map(point_id_string)
                    .unwrap_or_default();
                // Scroll carries no similarity; report a full score
                scored_result(point.payload, 1.0, fallback_id)
            })
            .collect())
    }
}

/// Conjunction of the present filter fields; `None` when unfiltered
fn build_filter(filters: &SearchFilters) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(language) = &filters.language {
        conditions.push(Condition::matches("language", language.clone()));
    }
    if let Some(symbol_type) = filters.symbol_type {
        conditions.push(Condition::matches(
            "symbol_type",
            symbol_type.as_str().to_string(),
        ));
    }
    if let Some(path_prefix) = &filters.path_prefix {
        conditions.push(Condition::matches_text("path", path_prefix.clone()));
    }
    if let Some(file_hash) = &filters.file_hash {
        conditions.push(Condition::matches("file_hash", file_hash.clone()));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn build_payload(chunk: &Chunk) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("text".to_string(), chunk.text.clone().into());
    payload.insert("chunk_id".to_string(), chunk.id.clone().into());
    payload.insert("path".to_string(), chunk.metadata.path.clone().into());
    payload.insert("language".to_string(), chunk.metadata.language.clone().into());
    payload.insert(
        "symbol_type".to_string(),
        chunk.metadata.symbol_type.as_str().into(),
    );
    payload.insert(
        "symbol_name".to_string(),
        chunk.metadata.symbol_name.clone().into(),
    );
    payload.insert("start_line".to_string(), (chunk.metadata.start_line as i64).into());
    payload.insert("end_line".to_string(), (chunk.metadata.end_line as i64).into());
    payload.insert("file_hash".to_string(), chunk.metadata.file_hash.clone().into());
    payload
}

/// The single payload→chunk boundary; missing fields default to empty
/// strings, zero lines, and the `other` symbol type
fn chunk_from_payload(payload: &HashMap<String, Value>) -> Chunk {
    let get_str = |key: &str| -> String {
        payload
            .get(key)
            .and_then(|v| match &v.kind {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_default()
    };
    let get_line = |key: &str| -> usize {
        payload
            .get(key)
            .and_then(|v| match &v.kind {
                Some(Kind::IntegerValue(n)) => Some(*n as usize),
                _ => None,
            })
            .unwrap_or(0)
    };

    Chunk {
        id: get_str("chunk_id"),
        text: get_str("text"),
        metadata: ChunkMetadata {
            path: get_str("path"),
            language: get_str("language"),
            symbol_type: SymbolType::parse_lossy(&get_str("symbol_type")),
            symbol_name: get_str("symbol_name"),
            start_line: get_line("start_line"),
            end_line: get_line("end_line"),
            file_hash: get_str("file_hash"),
        },
    }
}

fn scored_result(
    payload: HashMap<String, Value>,
    score: f32,
    fallback_id: String,
) -> SearchResult {
    let chunk = chunk_from_payload(&payload);
    let id = if chunk.id.is_empty() { fallback_id } else { chunk.id.clone() };
    SearchResult { id, score, chunk }
}

fn point_id_string(id: &qdrant_client::qdrant::PointId) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match &id.point_id_options {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => String::new(),
    }
}
