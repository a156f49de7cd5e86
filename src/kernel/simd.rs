//! SIMD kernels processing 8 lanes at a time via the `wide` crate.
//!
//! `wide` exposes no hardware gather, so [`add_gathered`] gathers tensor
//! values with a scalar loop and vectorizes only the add. The win over the
//! scalar kernel is modest for gathered updates and largest for intercept
//! updates, which are pure streaming adds.

use wide::f32x8;

/// Lane width of the SIMD kernels.
pub(super) const SIMD_WIDTH: usize = 8;

#[inline]
pub(super) fn add_gathered(scores: &mut [f32], bins: &[u32], tensor: &[f32]) {
    let mut chunks = scores.chunks_exact_mut(SIMD_WIDTH);
    let mut bin_chunks = bins.chunks_exact(SIMD_WIDTH);

    for (score_chunk, bin_chunk) in chunks.by_ref().zip(bin_chunks.by_ref()) {
        // Scalar gather into a lane array, then one vector add.
        let mut gathered = [0.0f32; SIMD_WIDTH];
        let mut lanes = [0.0f32; SIMD_WIDTH];
        for lane in 0..SIMD_WIDTH {
            gathered[lane] = tensor[bin_chunk[lane] as usize];
            lanes[lane] = score_chunk[lane];
        }

        let sum = f32x8::from(lanes) + f32x8::from(gathered);
        score_chunk.copy_from_slice(&sum.to_array());
    }

    for (score, &bin) in chunks
        .into_remainder()
        .iter_mut()
        .zip(bin_chunks.remainder())
    {
        *score += tensor[bin as usize];
    }
}

#[inline]
fn load(lane_slice: &[f32]) -> f32x8 {
    let mut lanes = [0.0f32; SIMD_WIDTH];
    lanes.copy_from_slice(&lane_slice[..SIMD_WIDTH]);
    f32x8::from(lanes)
}

/// Fused squared-error gradient pass: `grad = w * (score - target)`,
/// `hess = w`. Pure elementwise arithmetic, so the whole pass vectorizes.
#[inline]
pub(super) fn rmse_gradients(
    scores: &[f32],
    targets: &[f32],
    weights: &[f32],
    grads: &mut [f32],
    hess: &mut [f32],
) {
    let n = scores.len();
    let full = n - n % SIMD_WIDTH;

    if weights.is_empty() {
        let one = f32x8::splat(1.0);
        for i in (0..full).step_by(SIMD_WIDTH) {
            let r = load(&scores[i..]) - load(&targets[i..]);
            grads[i..i + SIMD_WIDTH].copy_from_slice(&r.to_array());
            hess[i..i + SIMD_WIDTH].copy_from_slice(&one.to_array());
        }
        for i in full..n {
            grads[i] = scores[i] - targets[i];
            hess[i] = 1.0;
        }
    } else {
        for i in (0..full).step_by(SIMD_WIDTH) {
            let w = load(&weights[i..]);
            let r = w * (load(&scores[i..]) - load(&targets[i..]));
            grads[i..i + SIMD_WIDTH].copy_from_slice(&r.to_array());
            hess[i..i + SIMD_WIDTH].copy_from_slice(&w.to_array());
        }
        for i in full..n {
            grads[i] = weights[i] * (scores[i] - targets[i]);
            hess[i] = weights[i];
        }
    }
}

#[inline]
pub(super) fn add_scalar(scores: &mut [f32], delta: f32) {
    let delta_v = f32x8::splat(delta);

    let mut chunks = scores.chunks_exact_mut(SIMD_WIDTH);
    for chunk in chunks.by_ref() {
        let mut lanes = [0.0f32; SIMD_WIDTH];
        lanes.copy_from_slice(chunk);

        let sum = f32x8::from(lanes) + delta_v;
        chunk.copy_from_slice(&sum.to_array());
    }
    for score in chunks.into_remainder() {
        *score += delta;
    }
}
