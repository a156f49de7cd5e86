//! Portable scalar kernels.

#[inline]
pub(super) fn add_gathered(scores: &mut [f32], bins: &[u32], tensor: &[f32]) {
    for (score, &bin) in scores.iter_mut().zip(bins) {
        *score += tensor[bin as usize];
    }
}

#[inline]
pub(super) fn add_scalar(scores: &mut [f32], delta: f32) {
    for score in scores.iter_mut() {
        *score += delta;
    }
}

#[inline]
pub(super) fn rmse_gradients(
    scores: &[f32],
    targets: &[f32],
    weights: &[f32],
    grads: &mut [f32],
    hess: &mut [f32],
) {
    if weights.is_empty() {
        for i in 0..scores.len() {
            grads[i] = scores[i] - targets[i];
            hess[i] = 1.0;
        }
    } else {
        for i in 0..scores.len() {
            grads[i] = weights[i] * (scores[i] - targets[i]);
            hess[i] = weights[i];
        }
    }
}
