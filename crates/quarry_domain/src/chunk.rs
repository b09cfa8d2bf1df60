//! Domain models for semantically bounded file fragments

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// Kind of symbol a chunk was extracted from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Function,
    Class,
    Method,
    Module,
    Markdown,
    #[default]
    Other,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Module => "module",
            Self::Markdown => "markdown",
            Self::Other => "other",
        }
    }

    /// Parse a stored payload value, defaulting unknown strings to `Other`
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "function" => Self::Function,
            "class" => Self::Class,
            "method" => Self::Method,
            "module" => Self::Module,
            "markdown" => Self::Markdown,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to every chunk and mirrored into the store payload
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq, Default)]
#[setters(into)]
pub struct ChunkMetadata {
    /// File path, absolute or repo-relative
    pub path: String,
    /// Lowercase language identifier, e.g. `typescript`, `markdown`
    pub language: String,
    /// Kind of symbol the chunk covers
    pub symbol_type: SymbolType,
    /// Best-effort symbol name; `(document start)` for a pre-header prefix
    pub symbol_name: String,
    /// 1-based inclusive start line in the original file
    pub start_line: usize,
    /// 1-based inclusive end line in the original file
    pub end_line: usize,
    /// First 16 hex chars of SHA-256 over the whole file content
    pub file_hash: String,
}

/// A semantically coherent fragment of one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable identifier, unique across all chunks currently stored
    pub id: String,
    /// Raw fragment text
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self { id: id.into(), text: text.into(), metadata }
    }

    /// Display name for logs: `path:symbol` or `path:start-end`
    pub fn display_name(&self) -> String {
        if self.metadata.symbol_name.is_empty() {
            format!(
                "{}:{}-{}",
                self.metadata.path, self.metadata.start_line, self.metadata.end_line
            )
        } else {
            format!("{}:{}", self.metadata.path, self.metadata.symbol_name)
        }
    }

    /// Number of lines covered in the original file
    pub fn line_count(&self) -> usize {
        self.metadata.end_line.saturating_sub(self.metadata.start_line) + 1
    }
}
