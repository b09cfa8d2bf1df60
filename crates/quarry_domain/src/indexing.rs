//! Domain models for indexing runs

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// Options for one directory indexing run
#[derive(Debug, Clone, Serialize, Deserialize, Setters, Default)]
#[setters(strip_option, into)]
pub struct IndexOptions {
    /// Glob patterns a file must match to be indexed; empty means all
    pub include_globs: Vec<String>,
    /// Glob patterns that exclude a file even when included
    pub exclude_globs: Vec<String>,
}

/// Outcome of one indexing run
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IndexReport {
    /// Files chunked, embedded and upserted
    pub indexed: usize,
    /// Files skipped because their content hash was unchanged
    pub skipped: usize,
    /// Per-file failures; the run continues past them
    pub errors: Vec<String>,
}
