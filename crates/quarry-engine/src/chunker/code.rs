//! AST-aware code chunking

use std::path::Path;

use tracing::{debug, warn};
use tree_sitter::{Node, Parser};

use quarry_domain::{Chunk, ChunkMetadata, SymbolType};

use crate::chunker::languages::{LanguageSpec, NodeKinds};
use crate::fingerprint::ChunkIdAllocator;

/// Size bounds for code chunks, in characters
#[derive(Debug, Clone)]
pub struct CodeChunkerConfig {
    /// Symbols longer than this are split into continuation chunks
    pub max_chunk_size: usize,
    /// Module residue below this merges into a neighboring symbol
    pub min_chunk_size: usize,
}

impl Default for CodeChunkerConfig {
    fn default() -> Self {
        Self { max_chunk_size: 2000, min_chunk_size: 100 }
    }
}

/// A run of source lines tagged with their 1-based file line numbers
///
/// Class chunks drop their method bodies, so the numbers are not always
/// contiguous; chunk line ranges stay accurate either way.
#[derive(Clone, Default)]
struct LineRun<'a> {
    lines: Vec<&'a str>,
    numbers: Vec<usize>,
}

impl<'a> LineRun<'a> {
    fn from_range(all: &[&'a str], start: usize, end: usize) -> Self {
        let end = end.min(all.len());
        if start == 0 || start > end {
            return Self::default();
        }
        Self {
            lines: all[start - 1..end].to_vec(),
            numbers: (start..=end).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn char_len(&self) -> usize {
        self.lines.iter().map(|l| l.len() + 1).sum::<usize>().saturating_sub(1)
    }

    fn start_line(&self) -> usize {
        self.numbers.first().copied().unwrap_or(1)
    }

    fn end_line(&self) -> usize {
        self.numbers.last().copied().unwrap_or(1)
    }

    fn prepend(&mut self, mut other: LineRun<'a>) {
        std::mem::swap(&mut self.lines, &mut other.lines);
        std::mem::swap(&mut self.numbers, &mut other.numbers);
        self.lines.extend(other.lines);
        self.numbers.extend(other.numbers);
    }

    fn append(&mut self, other: LineRun<'a>) {
        self.lines.extend(other.lines);
        self.numbers.extend(other.numbers);
    }
}

/// One symbol found at the top level of a file
struct SymbolSpan {
    kind: SymbolType,
    name: String,
    /// 1-based inclusive lines of the whole symbol (wrapper included)
    start_line: usize,
    end_line: usize,
    /// Methods contained in a class-like symbol, in document order
    methods: Vec<SymbolSpan>,
}

pub struct CodeChunker {
    config: CodeChunkerConfig,
}

impl Default for CodeChunker {
    fn default() -> Self {
        Self::new(CodeChunkerConfig::default())
    }
}

impl CodeChunker {
    pub fn new(config: CodeChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk one source file; never fails, falling back to a single
    /// `other` chunk when the grammar rejects the content
    pub fn chunk_file(
        &self,
        path: &str,
        content: &str,
        file_hash: &str,
        spec: &LanguageSpec,
    ) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let mut parser = Parser::new();
        if parser.set_language(&spec.language()).is_err() {
            warn!(language = spec.name, "grammar failed to load");
            return vec![self.fallback_chunk(path, content, file_hash, spec.name)];
        }

        let tree = match parser.parse(content, None) {
            Some(tree) if !tree.root_node().has_error() => tree,
            _ => {
                debug!(path, language = spec.name, "parse failed, emitting whole-file chunk");
                return vec![self.fallback_chunk(path, content, file_hash, spec.name)];
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        let symbols = collect_symbols(tree.root_node(), content, spec.kinds);
        self.assemble(path, &lines, file_hash, spec.name, symbols)
    }

    /// Single `other` chunk covering the whole file
    fn fallback_chunk(&self, path: &str, content: &str, file_hash: &str, language: &str) -> Chunk {
        whole_file_chunk(path, content, file_hash, language)
    }

    /// Interleave residue segments and symbol chunks in document order
    fn assemble(
        &self,
        path: &str,
        lines: &[&str],
        file_hash: &str,
        language: &str,
        symbols: Vec<SymbolSpan>,
    ) -> Vec<Chunk> {
        let mut ids = ChunkIdAllocator::new(file_hash);
        let mut builder = ChunkBuilder {
            path,
            language,
            file_hash,
            config: &self.config,
            ids: &mut ids,
            chunks: Vec::new(),
            symbol_cursor: 1,
        };

        let mut cursor = 1usize;
        let mut pending = LineRun::default();

        for symbol in symbols {
            if cursor < symbol.start_line {
                let gap = LineRun::from_range(lines, cursor, symbol.start_line - 1);
                if !gap.text().trim().is_empty() {
                    pending.append(gap);
                }
            }
            let merged = builder.take_residue_for_merge(&mut pending);
            builder.emit_symbol(lines, symbol, merged);
            cursor = cursor.max(builder.symbol_cursor);
        }

        if cursor <= lines.len() {
            let tail = LineRun::from_range(lines, cursor, lines.len());
            if !tail.text().trim().is_empty() {
                pending.append(tail);
            }
        }
        builder.flush_trailing_residue(pending);

        builder.chunks
    }
}

/// Incrementally emits chunks for one file
struct ChunkBuilder<'a> {
    path: &'a str,
    language: &'a str,
    file_hash: &'a str,
    config: &'a CodeChunkerConfig,
    ids: &'a mut ChunkIdAllocator,
    chunks: Vec<Chunk>,
    /// First line after the last emitted symbol
    symbol_cursor: usize,
}

impl<'a> ChunkBuilder<'a> {
    /// Flush pending residue as a module chunk if large enough; return it
    /// for merging into the next symbol otherwise
    fn take_residue_for_merge(&mut self, pending: &mut LineRun<'a>) -> Option<LineRun<'a>> {
        if pending.is_empty() {
            return None;
        }
        let residue = std::mem::take(pending);
        if residue.text().trim().is_empty() {
            return None;
        }
        if residue.char_len() >= self.config.min_chunk_size {
            self.push_module_chunk(residue);
            None
        } else {
            Some(residue)
        }
    }

    /// Terminal residue merges backwards into the last chunk when small
    fn flush_trailing_residue(&mut self, pending: LineRun<'a>) {
        if pending.is_empty() || pending.text().trim().is_empty() {
            return;
        }
        if pending.char_len() >= self.config.min_chunk_size || self.chunks.is_empty() {
            self.push_module_chunk(pending);
        } else if let Some(last) = self.chunks.last_mut() {
            last.text.push('\n');
            last.text.push_str(&pending.text());
            last.metadata.end_line = pending.end_line();
        }
    }

    fn push_module_chunk(&mut self, run: LineRun<'a>) {
        let name = "(module)";
        let chunk = Chunk::new(
            self.ids.allocate(run.start_line(), name),
            run.text(),
            self.metadata(SymbolType::Module, name, run.start_line(), run.end_line()),
        );
        self.chunks.push(chunk);
    }

    fn emit_symbol(&mut self, lines: &[&'a str], symbol: SymbolSpan, merged: Option<LineRun<'a>>) {
        self.symbol_cursor = symbol.end_line + 1;
        if symbol.kind == SymbolType::Class {
            self.emit_class(lines, symbol, merged);
        } else {
            let run = LineRun::from_range(lines, symbol.start_line, symbol.end_line);
            self.emit_sized(symbol.kind, &symbol.name, run, merged);
        }
    }

    /// Class chunk carries the header and non-method body; each method
    /// becomes its own chunk
    fn emit_class(&mut self, lines: &[&'a str], symbol: SymbolSpan, merged: Option<LineRun<'a>>) {
        let mut class_run = LineRun::default();
        for line in symbol.start_line..=symbol.end_line.min(lines.len()) {
            let in_method = symbol
                .methods
                .iter()
                .any(|m| line >= m.start_line && line <= m.end_line);
            if !in_method {
                class_run.lines.push(lines[line - 1]);
                class_run.numbers.push(line);
            }
        }
        self.emit_sized(SymbolType::Class, &symbol.name, class_run, merged);

        for method in symbol.methods {
            let run = LineRun::from_range(lines, method.start_line, method.end_line);
            self.emit_sized(SymbolType::Method, &method.name, run, None);
        }
    }

    /// Emit one symbol, splitting into continuation chunks when over-long
    fn emit_sized(
        &mut self,
        kind: SymbolType,
        name: &str,
        mut run: LineRun<'a>,
        merged: Option<LineRun<'a>>,
    ) {
        if let Some(residue) = merged {
            run.prepend(residue);
        }
        if run.is_empty() {
            return;
        }

        if run.char_len() <= self.config.max_chunk_size {
            let chunk = Chunk::new(
                self.ids.allocate(run.start_line(), name),
                run.text(),
                self.metadata(kind, name, run.start_line(), run.end_line()),
            );
            self.chunks.push(chunk);
            return;
        }

        for (part, piece) in split_oversized(&run, self.config.max_chunk_size)
            .into_iter()
            .enumerate()
        {
            let id = if part == 0 {
                self.ids.allocate(piece.start_line, name)
            } else {
                self.ids.allocate_continuation(piece.start_line, name, part)
            };
            let chunk = Chunk::new(
                id,
                piece.text,
                self.metadata(kind, name, piece.start_line, piece.end_line),
            );
            self.chunks.push(chunk);
        }
    }

    fn metadata(&self, kind: SymbolType, name: &str, start: usize, end: usize) -> ChunkMetadata {
        ChunkMetadata {
            path: self.path.to_string(),
            language: self.language.to_string(),
            symbol_type: kind,
            symbol_name: name.to_string(),
            start_line: start,
            end_line: end,
            file_hash: self.file_hash.to_string(),
        }
    }
}

/// Single `other` chunk spanning an entire file
pub(crate) fn whole_file_chunk(path: &str, content: &str, file_hash: &str, language: &str) -> Chunk {
    let end_line = content.lines().count().max(1);
    let name = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let mut ids = ChunkIdAllocator::new(file_hash);
    Chunk::new(
        ids.allocate(1, &name),
        content.to_string(),
        ChunkMetadata {
            path: path.to_string(),
            language: language.to_string(),
            symbol_type: SymbolType::Other,
            symbol_name: name,
            start_line: 1,
            end_line,
            file_hash: file_hash.to_string(),
        },
    )
}

struct SplitPiece {
    text: String,
    start_line: usize,
    end_line: usize,
}

/// Split an over-long symbol on line boundaries, preferring blank lines;
/// every continuation repeats the signature line for context, while line
/// ranges keep referring to the original file
fn split_oversized(run: &LineRun<'_>, max_chunk_size: usize) -> Vec<SplitPiece> {
    let signature = run.lines.first().copied().unwrap_or_default();
    // Reserve room for the repeated signature so continuations stay in
    // budget too
    let budget = max_chunk_size
        .saturating_sub(signature.len() + 1)
        .max(max_chunk_size / 2);

    let mut pieces: Vec<SplitPiece> = Vec::new();
    let mut group: Vec<&str> = Vec::new();
    let mut group_numbers: Vec<usize> = Vec::new();
    let mut group_len = 0usize;

    let flush =
        |group: &mut Vec<&str>, group_numbers: &mut Vec<usize>, pieces: &mut Vec<SplitPiece>| {
            if group.is_empty() {
                return;
            }
            let body = group.join("\n");
            let text = if pieces.is_empty() {
                body
            } else {
                format!("{signature}\n{body}")
            };
            pieces.push(SplitPiece {
                text,
                start_line: group_numbers[0],
                end_line: *group_numbers.last().expect("group is non-empty"),
            });
            group.clear();
            group_numbers.clear();
        };

    for (&line, &number) in run.lines.iter().zip(run.numbers.iter()) {
        let over_budget = !group.is_empty() && group_len + line.len() + 1 > budget;
        let at_blank_boundary = line.trim().is_empty() && group_len >= budget / 2;

        if over_budget || at_blank_boundary {
            flush(&mut group, &mut group_numbers, &mut pieces);
            group_len = 0;
        }

        group.push(line);
        group_numbers.push(number);
        group_len += line.len() + 1;
    }
    flush(&mut group, &mut group_numbers, &mut pieces);

    pieces
}

/// Collect top-level symbols, descending into class bodies for methods
fn collect_symbols(root: Node<'_>, source: &str, kinds: &NodeKinds) -> Vec<SymbolSpan> {
    let mut symbols = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let (node, span_node) = unwrap_wrapper(child, kinds);
        let kind = node.kind();

        let symbol_type = if kinds.functions.contains(&kind) {
            Some(SymbolType::Function)
        } else if kinds.methods.contains(&kind) {
            Some(SymbolType::Method)
        } else if kinds.classes.contains(&kind) {
            Some(SymbolType::Class)
        } else {
            None
        };

        if let Some(symbol_type) = symbol_type {
            let methods = if symbol_type == SymbolType::Class {
                collect_methods(node, source, kinds)
            } else {
                Vec::new()
            };
            symbols.push(SymbolSpan {
                kind: symbol_type,
                name: symbol_name(node, source),
                start_line: span_node.start_position().row + 1,
                end_line: span_node.end_position().row + 1,
                methods,
            });
        }
    }
    symbols.sort_by_key(|s| s.start_line);
    symbols
}

/// Look through export statements and decorator wrappers
fn unwrap_wrapper<'t>(node: Node<'t>, kinds: &NodeKinds) -> (Node<'t>, Node<'t>) {
    if kinds.wrappers.contains(&node.kind()) {
        let mut cursor = node.walk();
        for inner in node.named_children(&mut cursor) {
            let kind = inner.kind();
            if kinds.functions.contains(&kind)
                || kinds.classes.contains(&kind)
                || kinds.methods.contains(&kind)
            {
                return (inner, node);
            }
        }
    }
    (node, node)
}

/// Methods of a class-like node: callable descendants outside other
/// callables
fn collect_methods(class_node: Node<'_>, source: &str, kinds: &NodeKinds) -> Vec<SymbolSpan> {
    let mut methods = Vec::new();
    let mut cursor = class_node.walk();
    for child in class_node.named_children(&mut cursor) {
        collect_methods_into(child, source, kinds, &mut methods);
    }
    methods.sort_by_key(|m| m.start_line);
    methods
}

fn collect_methods_into(node: Node<'_>, source: &str, kinds: &NodeKinds, out: &mut Vec<SymbolSpan>) {
    let kind = node.kind();
    if kinds.methods.contains(&kind) || kinds.functions.contains(&kind) {
        out.push(SymbolSpan {
            kind: SymbolType::Method,
            name: symbol_name(node, source),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            methods: Vec::new(),
        });
        // Functions nested inside a method stay part of it
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_methods_into(child, source, kinds, out);
    }
}

/// Best-effort symbol name from the grammar
fn symbol_name(node: Node<'_>, source: &str) -> String {
    for field in ["name", "type"] {
        if let Some(named) = node.child_by_field_name(field) {
            if let Ok(text) = named.utf8_text(source.as_bytes()) {
                return text.to_string();
            }
        }
    }
    // Fall back to the first identifier-like child
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind().ends_with("identifier") {
            if let Ok(text) = child.utf8_text(source.as_bytes()) {
                return text.to_string();
            }
        }
    }
    "(anonymous)".to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::chunker::languages::spec_for_extension;
    use crate::fingerprint::file_hash;

    const TS_FIXTURE: &str = r#"import { re } from "./patterns";

const EMAIL_RE = /.+@.+/;
const MAX_ATTEMPTS = 3;
const GREETING = "hello";
let attempts = 0;
const setup = "module level setup beyond the minimum size threshold";

export function validateEmail(email: string): boolean {
  return EMAIL_RE.test(email);
}

export class SessionStore {
  private sessions: Map<string, string> = new Map();

  get(key: string): string | undefined {
    return this.sessions.get(key);
  }

  set(key: string, value: string): void {
    this.sessions.set(key, value);
  }
}
"#;

    fn chunk_fixture(content: &str, ext: &str) -> Vec<Chunk> {
        let spec = spec_for_extension(ext).unwrap();
        let hash = file_hash(content.as_bytes());
        CodeChunker::default().chunk_file("src/auth.ts", content, &hash, spec)
    }

    #[test]
    fn test_typescript_symbols_and_residue() {
        let chunks = chunk_fixture(TS_FIXTURE, "ts");

        let kinds: Vec<(SymbolType, &str)> = chunks
            .iter()
            .map(|c| (c.metadata.symbol_type, c.metadata.symbol_name.as_str()))
            .collect();
        let expected = vec![
            (SymbolType::Module, "(module)"),
            (SymbolType::Function, "validateEmail"),
            (SymbolType::Class, "SessionStore"),
            (SymbolType::Method, "get"),
            (SymbolType::Method, "set"),
        ];

        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_class_chunk_excludes_method_bodies() {
        let chunks = chunk_fixture(TS_FIXTURE, "ts");
        let class_chunk = chunks
            .iter()
            .find(|c| c.metadata.symbol_type == SymbolType::Class)
            .unwrap();

        assert!(class_chunk.text.contains("export class SessionStore"));
        assert!(class_chunk.text.contains("private sessions"));
        assert!(!class_chunk.text.contains("this.sessions.get"));
        // The class range still spans the whole declaration
        assert!(class_chunk.metadata.end_line > class_chunk.metadata.start_line);
    }

    #[test]
    fn test_method_line_ranges_point_into_file() {
        let chunks = chunk_fixture(TS_FIXTURE, "ts");
        let lines: Vec<&str> = TS_FIXTURE.lines().collect();

        for chunk in chunks.iter().filter(|c| c.metadata.symbol_type == SymbolType::Method) {
            let first = lines[chunk.metadata.start_line - 1];
            assert!(chunk.text.starts_with(first.trim_start_matches(' ')) || chunk.text.contains(first));
            assert!(chunk.metadata.start_line <= chunk.metadata.end_line);
            assert!(chunk.metadata.end_line <= lines.len());
        }
    }

    #[test]
    fn test_rechunking_is_deterministic() {
        let first = chunk_fixture(TS_FIXTURE, "ts");
        let second = chunk_fixture(TS_FIXTURE, "ts");

        assert_eq!(first, second);
    }

    #[test]
    fn test_same_file_hash_for_all_chunks() {
        let chunks = chunk_fixture(TS_FIXTURE, "ts");
        let hash = file_hash(TS_FIXTURE.as_bytes());

        assert!(chunks.iter().all(|c| c.metadata.file_hash == hash));

        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn test_unparseable_file_falls_back_to_other() {
        let content = "def def def ((( nonsense";
        let spec = spec_for_extension("py").unwrap();
        let hash = file_hash(content.as_bytes());

        let chunks = CodeChunker::default().chunk_file("broken.py", content, &hash, spec);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.symbol_type, SymbolType::Other);
        assert_eq!(chunks[0].text, content);
        assert_eq!(chunks[0].metadata.start_line, 1);
    }

    #[test]
    fn test_oversized_function_splits_with_signature_context() {
        let mut body = String::from("function bigTable() {\n");
        for i in 0..120 {
            body.push_str(&format!("  rows.push(\"row number {i} with some padding text\");\n"));
        }
        body.push_str("}\n");

        let spec = spec_for_extension("ts").unwrap();
        let hash = file_hash(body.as_bytes());
        let chunker = CodeChunker::new(CodeChunkerConfig {
            max_chunk_size: 800,
            min_chunk_size: 50,
        });
        let chunks = chunker.chunk_file("big.ts", &body, &hash, spec);

        assert!(chunks.len() >= 2, "expected continuation chunks, got {}", chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.symbol_type, SymbolType::Function);
            assert_eq!(chunk.metadata.symbol_name, "bigTable");
            assert!(chunk.text.starts_with("function bigTable() {"));
            if i > 0 {
                assert!(chunk.id.contains("-p"), "continuation id missing suffix: {}", chunk.id);
            }
        }
        // Continuation ranges advance through the original file
        assert!(chunks.windows(2).all(|w| w[0].metadata.start_line < w[1].metadata.start_line));
    }

    #[test]
    fn test_small_residue_merges_into_following_symbol() {
        let content = "import x from \"y\";\n\nexport function tiny(): number {\n  return 1;\n}\n";
        let chunks = chunk_fixture(content, "ts");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.symbol_type, SymbolType::Function);
        assert!(chunks[0].text.starts_with("import x from \"y\";"));
        assert_eq!(chunks[0].metadata.start_line, 1);
    }

    #[test]
    fn test_python_methods_detected() {
        let content = r#"class Greeter:
    prefix = "hi"

    def greet(self, name):
        return f"{self.prefix} {name}"

def main():
    print(Greeter().greet("world"))
"#;
        let spec = spec_for_extension("py").unwrap();
        let hash = file_hash(content.as_bytes());
        let chunks = CodeChunker::default().chunk_file("greeter.py", content, &hash, spec);

        let kinds: Vec<(SymbolType, &str)> = chunks
            .iter()
            .map(|c| (c.metadata.symbol_type, c.metadata.symbol_name.as_str()))
            .collect();
        let expected = vec![
            (SymbolType::Class, "Greeter"),
            (SymbolType::Method, "greet"),
            (SymbolType::Function, "main"),
        ];

        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        let chunks = chunk_fixture("   \n\n", "ts");

        assert!(chunks.is_empty());
    }
}
