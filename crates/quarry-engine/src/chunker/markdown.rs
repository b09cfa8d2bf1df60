//! Header-bounded markdown chunking

use quarry_domain::{Chunk, ChunkMetadata, SymbolType};

use crate::fingerprint::ChunkIdAllocator;

/// Symbol name for content preceding the first header
pub const DOCUMENT_START: &str = "(document start)";

/// Options for markdown splitting
#[derive(Debug, Clone)]
pub struct MarkdownChunkerConfig {
    /// Sections longer than this split on paragraph boundaries
    pub max_chunk_size: usize,
    /// Sections shorter than this merge into the preceding chunk
    pub min_chunk_size: usize,
    /// Reserved knob for overlapping continuations; the repeated section
    /// header is the only overlap currently applied
    pub overlap_ratio: f32,
    /// Split over-long sections at blank lines instead of mid-paragraph
    pub split_on_paragraphs: bool,
}

impl Default for MarkdownChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1500,
            min_chunk_size: 100,
            overlap_ratio: 0.15,
            split_on_paragraphs: true,
        }
    }
}

/// One header-bounded section before size handling
struct Section {
    /// Header line, empty for the pre-header prefix
    header: String,
    symbol_name: String,
    start_line: usize,
    end_line: usize,
    /// All lines of the section, header included
    lines: Vec<String>,
}

pub struct MarkdownChunker {
    config: MarkdownChunkerConfig,
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self::new(MarkdownChunkerConfig::default())
    }
}

impl MarkdownChunker {
    pub fn new(config: MarkdownChunkerConfig) -> Self {
        Self { config }
    }

    pub fn chunk_file(&self, path: &str, content: &str, file_hash: &str) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let sections = split_sections(content);
        let mut ids = ChunkIdAllocator::new(file_hash);
        let mut chunks: Vec<Chunk> = Vec::new();

        for section in sections {
            let text = section.lines.join("\n");
            if text.trim().is_empty() {
                continue;
            }

            // Short sections fold into the preceding chunk
            if text.len() < self.config.min_chunk_size {
                if let Some(last) = chunks.last_mut() {
                    last.text.push('\n');
                    last.text.push_str(&text);
                    last.metadata.end_line = section.end_line;
                    continue;
                }
            }

            if text.len() <= self.config.max_chunk_size {
                chunks.push(self.chunk_for(
                    path,
                    file_hash,
                    &mut ids,
                    &section.symbol_name,
                    section.start_line,
                    section.end_line,
                    text,
                    0,
                ));
                continue;
            }

            for (part, piece) in self.split_section(&section).into_iter().enumerate() {
                chunks.push(self.chunk_for(
                    path,
                    file_hash,
                    &mut ids,
                    &section.symbol_name,
                    piece.start_line,
                    piece.end_line,
                    piece.text,
                    part,
                ));
            }
        }

        chunks
    }

    #[allow(clippy::too_many_arguments)]
    fn chunk_for(
        &self,
        path: &str,
        file_hash: &str,
        ids: &mut ChunkIdAllocator,
        symbol_name: &str,
        start_line: usize,
        end_line: usize,
        text: String,
        part: usize,
    ) -> Chunk {
        let id = if part == 0 {
            ids.allocate(start_line, symbol_name)
        } else {
            ids.allocate_continuation(start_line, symbol_name, part)
        };
        Chunk::new(
            id,
            text,
            ChunkMetadata {
                path: path.to_string(),
                language: "markdown".to_string(),
                symbol_type: SymbolType::Markdown,
                symbol_name: symbol_name.to_string(),
                start_line,
                end_line,
                file_hash: file_hash.to_string(),
            },
        )
    }

    /// Split an over-long section on paragraph boundaries; every
    /// continuation repeats the header line, which is the sole overlap
    /// between fragments
    fn split_section(&self, section: &Section) -> Vec<SectionPiece> {
        let header = section.header.as_str();
        let header_cost = if header.is_empty() { 0 } else { header.len() + 1 };
        let budget = self
            .config
            .max_chunk_size
            .saturating_sub(header_cost)
            .max(self.config.max_chunk_size / 2);

        // Body lines with their file line numbers; the header line of the
        // section itself is re-attached per piece
        let body_offset = if header.is_empty() { 0 } else { 1 };
        let body: Vec<(usize, &String)> = section
            .lines
            .iter()
            .enumerate()
            .skip(body_offset)
            .map(|(i, l)| (section.start_line + i, l))
            .collect();

        let mut pieces: Vec<SectionPiece> = Vec::new();
        let mut group: Vec<&str> = Vec::new();
        let mut numbers: Vec<usize> = Vec::new();
        let mut group_len = 0usize;

        let flush = |group: &mut Vec<&str>,
                     numbers: &mut Vec<usize>,
                     pieces: &mut Vec<SectionPiece>| {
            if group.iter().all(|l| l.trim().is_empty()) {
                group.clear();
                numbers.clear();
                return;
            }
            let body_text = group.join("\n");
            let text = if header.is_empty() {
                body_text
            } else {
                format!("{header}\n{body_text}")
            };
            // The first piece keeps the original header position
            let start_line = if pieces.is_empty() { section.start_line } else { numbers[0] };
            pieces.push(SectionPiece {
                text,
                start_line,
                end_line: *numbers.last().expect("group is non-empty"),
            });
            group.clear();
            numbers.clear();
        };

        for (number, line) in body {
            let line_cost = line.len() + 1;
            let over_budget = !group.is_empty() && group_len + line_cost > budget;
            let paragraph_break =
                self.config.split_on_paragraphs && line.trim().is_empty() && group_len >= budget / 2;

            if over_budget || paragraph_break {
                flush(&mut group, &mut numbers, &mut pieces);
                group_len = 0;
            }

            group.push(line);
            numbers.push(number);
            group_len += line_cost;
        }
        flush(&mut group, &mut numbers, &mut pieces);

        pieces
    }
}

struct SectionPiece {
    text: String,
    start_line: usize,
    end_line: usize,
}

/// Header depth when `line` opens a section, ignoring fenced code blocks
fn header_depth(line: &str) -> Option<usize> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if (1..=6).contains(&hashes) && line.as_bytes().get(hashes) == Some(&b' ') {
        Some(hashes)
    } else {
        None
    }
}

/// Split a document at header lines; content before the first header
/// becomes a `(document start)` section
fn split_sections(content: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut in_fence = false;

    for (index, line) in content.lines().enumerate() {
        let number = index + 1;
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }

        let is_header = !in_fence && header_depth(line).is_some();
        if is_header || sections.is_empty() {
            let (header, symbol_name) = if is_header {
                let name = line.trim_start_matches('#').trim().to_string();
                (line.to_string(), name)
            } else {
                (String::new(), DOCUMENT_START.to_string())
            };
            sections.push(Section {
                header,
                symbol_name,
                start_line: number,
                end_line: number,
                lines: vec![line.to_string()],
            });
            continue;
        }

        let current = sections.last_mut().expect("at least one section is open");
        current.lines.push(line.to_string());
        current.end_line = number;
    }

    sections
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fingerprint::file_hash;

    fn chunk(content: &str) -> Vec<Chunk> {
        let hash = file_hash(content.as_bytes());
        MarkdownChunker::default().chunk_file("README.md", content, &hash)
    }

    #[test]
    fn test_document_start_prefix() {
        let content = "Intro paragraph with enough text to stand alone as a chunk of the document, well past the minimum size threshold for merging.\n\n# Setup\n\nInstall the thing with the package manager and configure the endpoints before you run the indexer for the first time.\n";
        let chunks = chunk(content);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.symbol_name, DOCUMENT_START);
        assert_eq!(chunks[0].metadata.start_line, 1);
        assert_eq!(chunks[1].metadata.symbol_name, "Setup");
        assert!(chunks[1].text.starts_with("# Setup"));
        assert!(chunks.iter().all(|c| c.metadata.symbol_type == SymbolType::Markdown));
    }

    #[test]
    fn test_long_section_splits_and_repeats_header() {
        let mut content = String::from("# H1\n\n");
        for i in 0..50 {
            content.push_str(&format!(
                "Paragraph {i} has roughly one hundred characters of prose to pad the section towards the split size.\n\n"
            ));
        }

        let chunks = chunk(&content);

        assert!(chunks.len() >= 2, "expected a split, got {} chunks", chunks.len());
        let last = chunks.len() - 1;
        for (i, piece) in chunks.iter().enumerate() {
            assert_eq!(piece.metadata.symbol_name, "H1");
            assert!(piece.text.starts_with("# H1"));
            if i < last {
                assert!(
                    piece.text.len() <= 1500,
                    "piece {i} is {} chars",
                    piece.text.len()
                );
            }
        }
        // Continuation ids carry a part suffix
        assert!(chunks[1].id.contains("-p"));
    }

    #[test]
    fn test_short_section_merges_into_preceding() {
        let content = "# First\n\nThis opening section carries plenty of content so it stays a chunk on its own without any merging applied to it.\n\n# Tiny\n\nshort\n";
        let chunks = chunk(content);

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("# Tiny"));
        assert_eq!(chunks[0].metadata.symbol_name, "First");
        assert_eq!(chunks[0].metadata.end_line, content.lines().count());
    }

    #[test]
    fn test_headers_inside_fences_ignored() {
        let content = "# Docs\n\nA code sample follows with enough surrounding prose to keep this section above the merge threshold.\n\n```bash\n# not a header\necho hi\n```\n\nTrailing prose.\n";
        let chunks = chunk(content);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.symbol_name, "Docs");
        assert!(chunks[0].text.contains("# not a header"));
    }

    #[test]
    fn test_nested_headers_start_new_chunks() {
        let content = "# Top\n\nTop section prose that is comfortably longer than the minimum chunk size threshold for this configuration.\n\n## Nested\n\nNested section prose that is also comfortably longer than the minimum chunk size threshold for markdown.\n";
        let chunks = chunk(content);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.symbol_name, "Top");
        assert_eq!(chunks[1].metadata.symbol_name, "Nested");
    }

    #[test]
    fn test_rechunking_is_deterministic() {
        let content = "# A\n\nSome text that makes section A long enough to stand by itself in the produced output listing.\n\n# B\n\nSome text that makes section B long enough to stand by itself in the produced output listing.\n";

        assert_eq!(chunk(content), chunk(content));
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        assert!(chunk("\n\n  \n").is_empty());
    }
}
