//! Norm and similarity computations for value vectors.

/// Compute the L2 (Euclidean) norm of a slice.
pub fn l2_norm(v: &[f64]) -> f64 {
    l2_norm_sq(v).sqrt()
}

/// Compute the squared L2 norm of a slice (avoids sqrt).
pub fn l2_norm_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Dot product over the common prefix of two slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Returns `None` when the lengths differ or either vector has zero norm,
/// since the angle is undefined there.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(1.0 - dot(a, b) / denom)
}
