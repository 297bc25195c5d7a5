//! Binomial coefficients and bitmask coalitions.

/// Binomial coefficient `C(n, k)` as `f64`; `0.0` when `k > n`.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Indices of the set bits of `mask`, ascending.
pub fn mask_members(mask: usize, n: usize) -> Vec<usize> {
    (0..n).filter(|&i| mask & (1 << i) != 0).collect()
}
