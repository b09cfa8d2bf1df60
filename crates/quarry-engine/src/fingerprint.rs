//! Content fingerprints and stable chunk identities

use sha2::{Digest, Sha256};

/// Number of hex chars kept from the SHA-256 digest
const FILE_HASH_LEN: usize = 16;

/// First 16 hex chars of SHA-256 over the raw file bytes
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..FILE_HASH_LEN].to_string()
}

/// Full SHA-256 hex digest; cache keys use the exact input text
pub fn text_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercase ASCII alphanumerics with runs of anything else collapsed to `-`
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Allocates `{file_hash}-{start_line}-{slug}` ids, deduplicating within
/// one file by appending `-p{N}`
pub struct ChunkIdAllocator {
    file_hash: String,
    used: std::collections::HashSet<String>,
}

impl ChunkIdAllocator {
    pub fn new(file_hash: impl Into<String>) -> Self {
        Self { file_hash: file_hash.into(), used: std::collections::HashSet::new() }
    }

    /// Id for a whole symbol or the first fragment of a split one
    pub fn allocate(&mut self, start_line: usize, symbol_name: &str) -> String {
        let base = self.base_id(start_line, symbol_name);
        self.dedupe(base)
    }

    /// Id for continuation fragment `part` (1-based) of an over-long symbol
    pub fn allocate_continuation(
        &mut self,
        start_line: usize,
        symbol_name: &str,
        part: usize,
    ) -> String {
        let base = format!("{}-p{part}", self.base_id(start_line, symbol_name));
        self.dedupe(base)
    }

    fn base_id(&self, start_line: usize, symbol_name: &str) -> String {
        let mut slugged = slug(symbol_name);
        if slugged.is_empty() {
            slugged = "chunk".to_string();
        }
        format!("{}-{start_line}-{slugged}", self.file_hash)
    }

    fn dedupe(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-p{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
