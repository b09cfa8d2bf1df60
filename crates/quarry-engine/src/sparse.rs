//! Deterministic hashed-vocabulary term-frequency vectors

use std::collections::BTreeMap;

use quarry_domain::SparseVector;

/// Fixed vocabulary size; hashed token indices live in `[0, VOCABULARY_SIZE)`
pub const VOCABULARY_SIZE: u32 = 30_000;

/// Produce a sparse term-frequency vector for one text
///
/// Tokens are maximal runs of `[a-z0-9_]` after lowercasing. Each unique
/// token is hashed into the fixed vocabulary; tokens colliding on an
/// index sum their frequencies. Indices come out strictly ascending.
pub fn vectorize(text: &str) -> SparseVector {
    let lowered = text.to_lowercase();
    let mut buckets: BTreeMap<u32, f32> = BTreeMap::new();

    for token in tokenize(&lowered) {
        *buckets.entry(token_index(token)).or_insert(0.0) += 1.0;
    }

    let mut indices = Vec::with_capacity(buckets.len());
    let mut values = Vec::with_capacity(buckets.len());
    for (index, value) in buckets {
        indices.push(index);
        values.push(value);
    }

    SparseVector::new(indices, values)
}

/// Polynomial rolling hash of a token, reduced to the vocabulary
fn token_index(token: &str) -> u32 {
    let mut hash: u64 = 0;
    for byte in token.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u64);
    }
    (hash % VOCABULARY_SIZE as u64) as u32
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
}
