//! Structure-of-Arrays gradient/hessian buffer.
//!
//! [`Gradients`] holds the per-sample derivatives that
//! [`apply_update`](crate::UpdateEngine::apply_update) recomputes after each
//! boosting step. Storage is column-major (output-major): all samples for
//! output 0, then all samples for output 1, and so on. The caller's histogram
//! layer sums contiguous per-output slices, so that axis stays contiguous.
//!
//! Layout for `n_samples` samples and `n_outputs` outputs:
//!
//! ```text
//! grads: [s0_o0, s1_o0, ..., sN_o0, s0_o1, s1_o1, ..., sN_o1, ...]
//! hess:  [s0_o0, s1_o0, ..., sN_o0, s0_o1, s1_o1, ..., sN_o1, ...]
//! ```
//!
//! Index formula: `grads[output * n_samples + sample]`.

/// Gradient and hessian storage for one dataset.
///
/// Separate contiguous `f32` arrays for gradients and hessians, organized
/// column-major for cache-friendly per-output scans.
#[derive(Debug, Clone)]
pub struct Gradients {
    grads: Vec<f32>,
    hess: Vec<f32>,
    n_samples: usize,
    n_outputs: usize,
}

impl Gradients {
    /// Create a zeroed buffer.
    ///
    /// # Panics
    ///
    /// Panics if `n_samples` or `n_outputs` is zero.
    pub fn new(n_samples: usize, n_outputs: usize) -> Self {
        assert!(n_samples > 0, "n_samples must be positive");
        assert!(n_outputs > 0, "n_outputs must be positive");

        let size = n_samples * n_outputs;
        Self {
            grads: vec![0.0; size],
            hess: vec![0.0; size],
            n_samples,
            n_outputs,
        }
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Total number of gradient entries (`n_samples * n_outputs`).
    #[inline]
    pub fn len(&self) -> usize {
        self.grads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    /// Reset all gradients and hessians to zero.
    pub fn reset(&mut self) {
        self.grads.fill(0.0);
        self.hess.fill(0.0);
    }

    /// Gradient and hessian for a (sample, output) pair.
    #[inline]
    pub fn get(&self, sample: usize, output: usize) -> (f32, f32) {
        let idx = self.index(sample, output);
        (self.grads[idx], self.hess[idx])
    }

    #[inline]
    pub fn set(&mut self, sample: usize, output: usize, grad: f32, hess: f32) {
        let idx = self.index(sample, output);
        self.grads[idx] = grad;
        self.hess[idx] = hess;
    }

    /// Full gradient array.
    #[inline]
    pub fn grads(&self) -> &[f32] {
        &self.grads
    }

    /// Full hessian array.
    #[inline]
    pub fn hess(&self) -> &[f32] {
        &self.hess
    }

    /// Mutable gradient and hessian arrays, for objectives that fill both.
    #[inline]
    pub fn as_mut_slices(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.grads, &mut self.hess)
    }

    /// Contiguous gradient slice for one output (all samples).
    #[inline]
    pub fn output_grads(&self, output: usize) -> &[f32] {
        debug_assert!(output < self.n_outputs);
        let start = output * self.n_samples;
        &self.grads[start..start + self.n_samples]
    }

    /// Contiguous hessian slice for one output (all samples).
    #[inline]
    pub fn output_hess(&self, output: usize) -> &[f32] {
        debug_assert!(output < self.n_outputs);
        let start = output * self.n_samples;
        &self.hess[start..start + self.n_samples]
    }

    /// Sum gradients and hessians for one output, optionally over a row
    /// subset.
    ///
    /// Accumulates in `f64` to reduce drift in Newton-step computations
    /// while keeping the storage in `f32`.
    #[inline]
    pub fn sum(&self, output: usize, rows: Option<&[u32]>) -> (f64, f64) {
        let grads = self.output_grads(output);
        let hess = self.output_hess(output);

        let mut sum_grad = 0.0f64;
        let mut sum_hess = 0.0f64;

        match rows {
            None => {
                for i in 0..self.n_samples {
                    sum_grad += grads[i] as f64;
                    sum_hess += hess[i] as f64;
                }
            }
            Some(rows) => {
                for &row in rows {
                    let row = row as usize;
                    sum_grad += grads[row] as f64;
                    sum_hess += hess[row] as f64;
                }
            }
        }
        (sum_grad, sum_hess)
    }

    /// Newton step for an intercept update: `-sum(grad) / sum(hess)`.
    ///
    /// Returns 0.0 when the hessian sum is below `min_hess`.
    pub fn newton_step(&self, output: usize, min_hess: f32) -> f32 {
        let (sum_grad, sum_hess) = self.sum(output, None);
        if sum_hess.abs() < min_hess as f64 {
            0.0
        } else {
            (-sum_grad / sum_hess) as f32
        }
    }

    #[inline]
    fn index(&self, sample: usize, output: usize) -> usize {
        debug_assert!(sample < self.n_samples);
        debug_assert!(output < self.n_outputs);
        output * self.n_samples + sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer() {
        let buffer = Gradients::new(100, 3);
        assert_eq!(buffer.n_samples(), 100);
        assert_eq!(buffer.n_outputs(), 3);
        assert_eq!(buffer.len(), 300);
    }

    #[test]
    fn get_set_roundtrip() {
        let mut buffer = Gradients::new(10, 3);
        buffer.set(0, 0, 0.2, 0.16);
        buffer.set(0, 1, 0.3, 0.21);
        buffer.set(0, 2, -0.5, 0.25);

        assert_eq!(buffer.get(0, 1), (0.3, 0.21));
        assert_eq!(buffer.output_grads(2)[0], -0.5);
    }

    #[test]
    fn output_slices_are_contiguous() {
        let mut buffer = Gradients::new(3, 2);
        buffer.set(0, 1, 10.0, 0.5);
        buffer.set(1, 1, 20.0, 0.5);
        buffer.set(2, 1, 30.0, 0.5);

        assert_eq!(buffer.output_grads(1), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn sum_with_row_subset() {
        let mut buffer = Gradients::new(4, 1);
        for i in 0..4 {
            buffer.set(i, 0, (i + 1) as f32, 1.0);
        }

        let (sum_g, sum_h) = buffer.sum(0, None);
        assert_eq!(sum_g, 10.0);
        assert_eq!(sum_h, 4.0);

        let (sum_g, sum_h) = buffer.sum(0, Some(&[1, 3]));
        assert_eq!(sum_g, 6.0);
        assert_eq!(sum_h, 2.0);
    }

    #[test]
    fn newton_step_intercept() {
        let mut buffer = Gradients::new(4, 1);
        for i in 0..4 {
            buffer.set(i, 0, (i + 1) as f32, 1.0);
        }
        let step = buffer.newton_step(0, 1e-6);
        assert!((step - (-2.5)).abs() < 1e-6);

        // Degenerate hessian sum yields no step.
        let zeros = Gradients::new(4, 1);
        assert_eq!(zeros.newton_step(0, 1e-6), 0.0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut buffer = Gradients::new(3, 2);
        buffer.set(0, 0, 1.0, 2.0);
        buffer.reset();
        assert!(buffer.grads().iter().all(|&v| v == 0.0));
        assert!(buffer.hess().iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "n_samples must be positive")]
    fn zero_samples_panics() {
        Gradients::new(0, 1);
    }
}
