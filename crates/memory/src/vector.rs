//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and brute-force nearest-neighbor ranking,
//! shared by every index implementation.

use memir_core::memory::{IndexEntry, IndexHit, MetadataFilter, matches_filter};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Cosine distance in [0, 2]; 0 means same direction.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank entries by cosine distance to `query`, closest first.
///
/// Entries failing `filter` are skipped. Ties keep their input order.
/// Returns at most `k` hits and never pads.
pub fn rank_nearest<'a, I>(
    entries: I,
    query: &[f32],
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<IndexHit>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let mut scored: Vec<IndexHit> = entries
        .into_iter()
        .filter(|entry| filter.is_none_or(|f| matches_filter(&entry.metadata, f)))
        .map(|entry| IndexHit {
            id: entry.id.clone(),
            document: entry.document.clone(),
            metadata: entry.metadata.clone(),
            distance: cosine_distance(&entry.embedding, query),
        })
        .collect();

    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
