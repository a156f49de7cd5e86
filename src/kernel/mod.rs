//! Compute kernels for score accumulation.
//!
//! The engine's inner loops come in zone-specialized variants: a portable
//! scalar kernel and a SIMD kernel built on the `wide` crate (behind the
//! `simd` feature). [`KernelKind`] selects between them at runtime; `Auto`
//! picks SIMD when compiled in.
//!
//! Kernels cover the memory-bound work: adding update tensors to score
//! columns, and the fused squared-error gradient pass whose elementwise
//! form needs no transcendentals. Objective math that does stays scalar.

mod scalar;
#[cfg(feature = "simd")]
mod simd;

use serde::{Deserialize, Serialize};

/// Kernel selection for the engine's inner loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// SIMD when the `simd` feature is compiled in, scalar otherwise.
    #[default]
    Auto,
    /// Portable scalar loops.
    Scalar,
    /// SIMD loops; silently falls back to scalar without the `simd` feature.
    Simd,
}

impl KernelKind {
    #[inline]
    fn use_simd(self) -> bool {
        match self {
            KernelKind::Scalar => false,
            KernelKind::Auto | KernelKind::Simd => cfg!(feature = "simd"),
        }
    }
}

/// `scores[i] += tensor[bins[i]]` for a single-output score column.
#[inline]
pub(crate) fn add_gathered(kind: KernelKind, scores: &mut [f32], bins: &[u32], tensor: &[f32]) {
    debug_assert_eq!(scores.len(), bins.len());

    if kind.use_simd() {
        #[cfg(feature = "simd")]
        {
            simd::add_gathered(scores, bins, tensor);
            return;
        }
    }
    scalar::add_gathered(scores, bins, tensor);
}

/// `scores[i] += delta` for every sample (intercept updates).
#[inline]
pub(crate) fn add_scalar(kind: KernelKind, scores: &mut [f32], delta: f32) {
    if kind.use_simd() {
        #[cfg(feature = "simd")]
        {
            simd::add_scalar(scores, delta);
            return;
        }
    }
    scalar::add_scalar(scores, delta);
}

/// Fused squared-error gradient pass for single-output sessions:
/// `grads[i] = w * (scores[i] - targets[i])`, `hess[i] = w`.
///
/// Empty `weights` means unit weights. The elementwise form needs no
/// transcendentals, so it vectorizes fully; other objectives go through
/// their own gradient loops.
#[inline]
pub(crate) fn rmse_gradients(
    kind: KernelKind,
    scores: &[f32],
    targets: &[f32],
    weights: &[f32],
    grads: &mut [f32],
    hess: &mut [f32],
) {
    debug_assert_eq!(scores.len(), targets.len());
    debug_assert_eq!(scores.len(), grads.len());
    debug_assert_eq!(scores.len(), hess.len());
    debug_assert!(weights.is_empty() || weights.len() == scores.len());

    if kind.use_simd() {
        #[cfg(feature = "simd")]
        {
            simd::rmse_gradients(scores, targets, weights, grads, hess);
            return;
        }
    }
    scalar::rmse_gradients(scores, targets, weights, grads, hess);
}

/// Strided gathered add for multi-output tensors:
/// `scores[i] += tensor[bins[i] * stride + offset]`.
///
/// Multi-output updates are rare enough that only a scalar variant exists.
#[inline]
pub(crate) fn add_gathered_strided(
    scores: &mut [f32],
    bins: &[u32],
    tensor: &[f32],
    stride: usize,
    offset: usize,
) {
    debug_assert_eq!(scores.len(), bins.len());
    for (score, &bin) in scores.iter_mut().zip(bins) {
        *score += tensor[bin as usize * stride + offset];
    }
}
