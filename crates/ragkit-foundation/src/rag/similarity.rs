//! Similarity computation functions for embedding vectors

/// Cosine similarity between two vectors.
///
/// Returns a value between -1.0 and 1.0 (1.0 for identical direction,
/// 0.0 for orthogonal, -1.0 for opposite direction).
/// Returns `None` when the vectors differ in length, are empty, or either has
/// zero magnitude, since the similarity is undefined there.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    let score = dot_product(a, b) / (norm_a * norm_b);
    score.is_finite().then_some(score)
}

/// Euclidean (L2) norm of a vector.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Dot product between two vectors.
fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
