//! Shared test doubles

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedder::EmbeddingBackend;
use crate::errors::Result;

/// Wraps a backend and counts the calls reaching it
pub(crate) struct CountingBackend<B> {
    inner: B,
    pub calls: AtomicUsize,
}

impl<B> CountingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<B: EmbeddingBackend> EmbeddingBackend for CountingBackend<B> {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(model, texts).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
