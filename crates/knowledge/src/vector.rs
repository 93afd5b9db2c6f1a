//! Vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity and cosine distance
//! - Exact k-nearest-neighbour ranking with a stable insertion-order tie-break

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
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

/// Cosine distance, `1 - cosine_similarity`, in [0, 2]. Lower is closer.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank candidates by cosine distance to `query` and keep the `k` closest.
///
/// Candidates must be supplied in insertion order: the sort is stable, so
/// equal distances keep that order and retrieval stays deterministic.
pub fn k_nearest<'a, T>(
    candidates: impl IntoIterator<Item = (T, &'a [f32])>,
    query: &[f32],
    k: usize,
) -> Vec<(T, f32)> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .map(|(item, embedding)| (item, cosine_distance(embedding, query)))
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    scored
}
