//! Incremental directory indexing

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use quarry_domain::{EmbedOptions, IndexOptions, IndexPoint, IndexReport};

use crate::chunker::Chunker;
use crate::embedder::EmbeddingService;
use crate::errors::{EngineError, Result};
use crate::fingerprint::file_hash;
use crate::store::VectorStore;

enum FileOutcome {
    Indexed,
    Skipped,
}

pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<EmbeddingService>,
    chunker: Chunker,
    collection: String,
    /// path → file_hash of the last successful index of that path
    index_cache: Mutex<HashMap<PathBuf, String>>,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<EmbeddingService>,
        chunker: Chunker,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            collection: collection.into(),
            index_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Walk `root` and index every recognized file, collecting per-file
    /// errors instead of aborting
    pub async fn index_directory(&self, root: &Path, opts: &IndexOptions) -> Result<IndexReport> {
        let include = build_globset(&opts.include_globs)?;
        let exclude = build_globset(&opts.exclude_globs)?;

        let files = self.collect_files(root, include.as_ref(), exclude.as_ref());
        info!(root = %root.display(), files = files.len(), "indexing directory");

        let mut report = IndexReport::default();
        for file in files {
            let bytes = match tokio::fs::read(&file).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    report
                        .errors
                        .push(format!("{}: {err}", file.display()));
                    continue;
                }
            };
            match self.index_file(&file, &bytes).await {
                Ok(FileOutcome::Indexed) => report.indexed += 1,
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    warn!(file = %file.display(), %err, "file failed to index");
                    report.errors.push(format!("{}: {err}", file.display()));
                }
            }
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            errors = report.errors.len(),
            "indexing run finished"
        );
        Ok(report)
    }

    /// Index one file from bytes already in hand
    pub async fn index_single_file(&self, path: &Path, bytes: &[u8]) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        match self.index_file(path, bytes).await? {
            FileOutcome::Indexed => report.indexed = 1,
            FileOutcome::Skipped => report.skipped = 1,
        }
        Ok(report)
    }

    /// Forget every recorded path → hash pair
    pub fn clear_index_cache(&self) {
        self.index_cache
            .lock()
            .expect("index cache mutex poisoned")
            .clear();
    }

    async fn index_file(&self, path: &Path, bytes: &[u8]) -> Result<FileOutcome> {
        let hash = file_hash(bytes);
        let previous = {
            let cache = self.index_cache.lock().expect("index cache mutex poisoned");
            cache.get(path).cloned()
        };

        if previous.as_deref() == Some(hash.as_str()) {
            debug!(file = %path.display(), "unchanged, skipping");
            return Ok(FileOutcome::Skipped);
        }

        let content = std::str::from_utf8(bytes).map_err(|err| {
            EngineError::file_error(
                path.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            )
        })?;

        // Delete-then-insert: the store shows the old point set or the
        // new one, never a mixture. Clearing the new hash as well keeps a
        // fresh process from duplicating identical content.
        if let Some(previous) = previous.filter(|p| p != &hash) {
            self.store
                .delete_by_file_hash(&self.collection, &previous)
                .await?;
        }
        self.store.delete_by_file_hash(&self.collection, &hash).await?;

        let path_str = path.to_string_lossy();
        let chunks = self.chunker.chunk_file(&path_str, content, &hash);
        if !chunks.is_empty() {
            let embedded = self
                .embedder
                .embed_chunks(&chunks, &EmbedOptions::default())
                .await?;
            let points: Vec<IndexPoint> = chunks
                .into_iter()
                .zip(embedded)
                .map(|(chunk, result)| IndexPoint {
                    chunk,
                    dense: result.dense_vector,
                    sparse: result.sparse_vector,
                })
                .collect();
            self.store.upsert(&self.collection, points).await?;
        }

        self.index_cache
            .lock()
            .expect("index cache mutex poisoned")
            .insert(path.to_path_buf(), hash);
        Ok(FileOutcome::Indexed)
    }

    /// Recognized files under `root` in sorted order, so reruns are
    /// reproducible
    fn collect_files(
        &self,
        root: &Path,
        include: Option<&GlobSet>,
        exclude: Option<&GlobSet>,
    ) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkBuilder::new(root).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "walk error");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.into_path();

            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            if !Chunker::recognizes(extension) {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(&path);
            if let Some(include) = include {
                if !include.is_match(relative) {
                    continue;
                }
            }
            if let Some(exclude) = exclude {
                if exclude.is_match(relative) {
                    continue;
                }
            }
            files.push(path);
        }
        files.sort();
        files
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|err| {
                EngineError::invalid_argument(format!("bad glob `{pattern}`: {err}"))
            })?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|err| EngineError::invalid_argument(format!("bad glob set: {err}")))?;
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use quarry_domain::SearchFilters;

    use super::*;
    use crate::cache::EmbeddingCache;
    use crate::embedder::HashBackend;
    use crate::store::{CollectionConfig, InMemoryStore};
    use crate::testing::CountingBackend;

    const COLLECTION: &str = "codebase";

    struct Fixture {
        indexer: Indexer,
        store: Arc<InMemoryStore>,
        backend: Arc<CountingBackend<HashBackend>>,
        dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store
            .ensure_collection(COLLECTION, &CollectionConfig::new(16))
            .await
            .unwrap();
        let backend = Arc::new(CountingBackend::new(HashBackend::new(16)));
        let embedder = Arc::new(EmbeddingService::new(
            backend.clone(),
            Arc::new(EmbeddingCache::default()),
            "nomic-embed-text",
        ));
        let indexer = Indexer::new(store.clone(), embedder, Chunker::default(), COLLECTION);
        Fixture { indexer, store, backend, dir: tempfile::tempdir().unwrap() }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const AUTH_TS: &str = "export function authenticate(user: string): boolean {\n  return sessions.has(user);\n}\n";
    const UTIL_TS: &str = "export function validateEmail(email: string): boolean {\n  return /.+@.+/.test(email);\n}\n";
    const README_MD: &str = "# Readme\n\nEnough prose here to clear the minimum markdown chunk size threshold comfortably for the test fixture.\n";

    #[tokio::test]
    async fn test_index_directory_counts_files() {
        let f = fixture().await;
        write(f.dir.path(), "auth.ts", AUTH_TS);
        write(f.dir.path(), "util.ts", UTIL_TS);
        write(f.dir.path(), "README.md", README_MD);
        write(f.dir.path(), "ignore.bin", "binary-ish");

        let report = f
            .indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(report.indexed, 3);
        assert_eq!(report.skipped, 0);
        assert!(report.errors.is_empty());
        let info = f.store.collection_info(COLLECTION).await.unwrap().unwrap();
        assert!(info.points_count >= 3);
    }

    #[tokio::test]
    async fn test_rerun_skips_unchanged_files_without_backend_calls() {
        let f = fixture().await;
        write(f.dir.path(), "auth.ts", AUTH_TS);
        write(f.dir.path(), "util.ts", UTIL_TS);

        f.indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();
        let calls_after_first = f.backend.call_count();

        let report = f
            .indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(report.indexed, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(f.backend.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn test_changed_file_swaps_point_sets() {
        let f = fixture().await;
        let path = write(f.dir.path(), "auth.ts", AUTH_TS);
        let old_hash = file_hash(AUTH_TS.as_bytes());

        f.indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();
        assert!(f.store.points_with_file_hash(COLLECTION, &old_hash) >= 1);

        let changed = AUTH_TS.replace("sessions", "tokens");
        std::fs::write(&path, &changed).unwrap();
        let new_hash = file_hash(changed.as_bytes());

        let report = f
            .indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(f.store.points_with_file_hash(COLLECTION, &old_hash), 0);
        assert!(f.store.points_with_file_hash(COLLECTION, &new_hash) >= 1);
    }

    #[tokio::test]
    async fn test_clear_index_cache_forces_reindex() {
        let f = fixture().await;
        write(f.dir.path(), "auth.ts", AUTH_TS);

        f.indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();
        f.indexer.clear_index_cache();

        let report = f
            .indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_exclude_globs_filter_files() {
        let f = fixture().await;
        write(f.dir.path(), "auth.ts", AUTH_TS);
        write(f.dir.path(), "auth.test.ts", UTIL_TS);
        let opts = IndexOptions::default().exclude_globs(vec!["*.test.ts".to_string()]);

        let report = f.indexer.index_directory(f.dir.path(), &opts).await.unwrap();

        assert_eq!(report.indexed, 1);
    }

    #[tokio::test]
    async fn test_include_globs_filter_files() {
        let f = fixture().await;
        write(f.dir.path(), "auth.ts", AUTH_TS);
        write(f.dir.path(), "README.md", README_MD);
        let opts = IndexOptions::default().include_globs(vec!["*.md".to_string()]);

        let report = f.indexer.index_directory(f.dir.path(), &opts).await.unwrap();

        assert_eq!(report.indexed, 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_collected_not_fatal() {
        let f = fixture().await;
        write(f.dir.path(), "auth.ts", AUTH_TS);
        std::fs::write(f.dir.path().join("bad.ts"), [0xff, 0xfe, 0x00, 0x01]).unwrap();

        let report = f
            .indexer
            .index_directory(f.dir.path(), &IndexOptions::default())
            .await
            .unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("bad.ts"));
    }

    #[tokio::test]
    async fn test_index_single_file_roundtrip() {
        let f = fixture().await;

        let first = f
            .indexer
            .index_single_file(Path::new("src/auth.ts"), AUTH_TS.as_bytes())
            .await
            .unwrap();
        let second = f
            .indexer
            .index_single_file(Path::new("src/auth.ts"), AUTH_TS.as_bytes())
            .await
            .unwrap();

        assert_eq!(first.indexed, 1);
        assert_eq!(second.skipped, 1);

        let results = f
            .store
            .scroll(
                COLLECTION,
                &SearchFilters::default().path_prefix("src/auth.ts"),
                10,
            )
            .await
            .unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_bad_glob_is_invalid_argument() {
        let f = fixture().await;
        let opts = IndexOptions::default().include_globs(vec!["{broken".to_string()]);

        let actual = f.indexer.index_directory(f.dir.path(), &opts).await;

        assert!(matches!(actual, Err(EngineError::InvalidArgument { .. })));
    }
}
