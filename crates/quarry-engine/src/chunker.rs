//! File chunking: grammar-aware for code, header-bounded for markdown

use std::path::Path;

use quarry_domain::Chunk;

pub use code::{CodeChunker, CodeChunkerConfig};
pub use markdown::{DOCUMENT_START, MarkdownChunker, MarkdownChunkerConfig};

mod code;
pub(crate) mod languages;
mod markdown;

/// Routes a file to the right chunker by extension
pub struct Chunker {
    code: CodeChunker,
    markdown: MarkdownChunker,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(CodeChunkerConfig::default(), MarkdownChunkerConfig::default())
    }
}

impl Chunker {
    pub fn new(code: CodeChunkerConfig, markdown: MarkdownChunkerConfig) -> Self {
        Self { code: CodeChunker::new(code), markdown: MarkdownChunker::new(markdown) }
    }

    /// Chunk one file; unrecognized extensions produce a single
    /// whole-file chunk
    pub fn chunk_file(&self, path: &str, content: &str, file_hash: &str) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let extension = extension_of(path);
        if matches!(extension.as_str(), "md" | "markdown") {
            return self.markdown.chunk_file(path, content, file_hash);
        }
        match languages::spec_for_extension(&extension) {
            Some(spec) => self.code.chunk_file(path, content, file_hash, spec),
            None => vec![code::whole_file_chunk(
                path,
                content,
                file_hash,
                if extension.is_empty() { "text" } else { &extension },
            )],
        }
    }

    /// Whether `extension` maps to a chunker
    pub fn recognizes(extension: &str) -> bool {
        let lower = extension.to_lowercase();
        matches!(lower.as_str(), "md" | "markdown")
            || languages::spec_for_extension(&lower).is_some()
    }
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}
