//! Small helpers shared across the crate.

/// Iterate sample weights, treating an empty slice as uniform weight 1.0.
///
/// This is the crate-wide convention: callers pass `&[]` for unweighted data
/// instead of materializing a vector of ones.
#[inline]
pub(crate) fn weight_iter(weights: &[f32], n_rows: usize) -> impl Iterator<Item = f32> + '_ {
    debug_assert!(weights.is_empty() || weights.len() >= n_rows);
    (0..n_rows).map(move |i| if weights.is_empty() { 1.0 } else { weights[i] })
}

/// Total weight of a sample set, accumulated in f64.
///
/// An empty slice counts every sample at weight 1.0.
#[inline]
pub(crate) fn weight_total(weights: &[f32], n_rows: usize) -> f64 {
    if weights.is_empty() {
        n_rows as f64
    } else {
        weights[..n_rows].iter().map(|&w| w as f64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_weights_are_uniform() {
        let ws: Vec<f32> = weight_iter(&[], 3).collect();
        assert_eq!(ws, vec![1.0, 1.0, 1.0]);
        assert_eq!(weight_total(&[], 3), 3.0);
    }

    #[test]
    fn explicit_weights_pass_through() {
        let weights = [0.5f32, 2.0, 1.5];
        let ws: Vec<f32> = weight_iter(&weights, 3).collect();
        assert_eq!(ws, vec![0.5, 2.0, 1.5]);
        assert_eq!(weight_total(&weights, 3), 4.0);
    }
}
