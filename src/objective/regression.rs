//! Regression objectives.

use super::{validate_objective_inputs, weight_iter, Objective};
use crate::error::ComputeError;
use crate::link::Link;

/// Weighted mean of targets, the optimal constant for squared-error losses.
fn weighted_mean(n_rows: usize, targets: &[f32], weights: &[f32]) -> f64 {
    let (sum_w, sum_wy) = targets[..n_rows]
        .iter()
        .zip(weight_iter(weights, n_rows))
        .fold((0.0f64, 0.0f64), |(sw, swy), (&y, w)| {
            (sw + w as f64, swy + w as f64 * y as f64)
        });
    if sum_w > 0.0 {
        sum_wy / sum_w
    } else {
        0.0
    }
}

// =============================================================================
// RMSE
// =============================================================================

/// Squared error regression, reported as RMSE.
///
/// - Gradient: `score - target`
/// - Hessian: `1.0` (times sample weight)
/// - Metric: weighted squared error; [`finish_metric`](Objective::finish_metric)
///   takes the square root of the weighted mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmseObjective;

impl Objective for RmseObjective {
    fn link(&self) -> Link {
        Link::Identity
    }

    fn has_hessian(&self) -> bool {
        false
    }

    fn compute_gradients(
        &self,
        n_rows: usize,
        n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
        gradients: &mut [f32],
        hessians: &mut [f32],
    ) {
        validate_objective_inputs(
            n_rows,
            n_outputs,
            scores.len(),
            gradients.len(),
            hessians.len(),
            weights,
        );
        debug_assert_eq!(n_outputs, 1);

        for (i, w) in weight_iter(weights, n_rows).enumerate() {
            gradients[i] = w * (scores[i] - targets[i]);
            hessians[i] = w;
        }
    }

    fn metric_sum(
        &self,
        n_rows: usize,
        _n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
    ) -> f64 {
        scores[..n_rows]
            .iter()
            .zip(&targets[..n_rows])
            .zip(weight_iter(weights, n_rows))
            .map(|((&s, &t), w)| {
                let r = (s - t) as f64;
                w as f64 * r * r
            })
            .sum()
    }

    fn finish_metric(&self, mean_metric: f64) -> f64 {
        mean_metric.sqrt()
    }

    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]) {
        outputs[0] = weighted_mean(n_rows, targets, weights) as f32;
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}

// =============================================================================
// Pseudo-Huber
// =============================================================================

/// Pseudo-Huber loss: a smooth approximation of Huber loss for robust
/// regression.
///
/// For residual `r = score - target` and slope `delta`:
/// - Loss: `delta^2 * (sqrt(1 + (r/delta)^2) - 1)`
/// - Gradient: `r / sqrt(1 + (r/delta)^2)`
/// - Hessian: `(1 + (r/delta)^2)^(-3/2)`
#[derive(Debug, Clone, Copy)]
pub struct PseudoHuberObjective {
    delta: f32,
}

impl PseudoHuberObjective {
    /// Create with the given slope parameter.
    ///
    /// # Panics
    ///
    /// Panics if `delta` is not positive and finite; config-string parsing
    /// reports the same condition as an error.
    pub fn new(delta: f32) -> Self {
        assert!(
            delta > 0.0 && delta.is_finite(),
            "delta must be positive and finite"
        );
        Self { delta }
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }
}

impl Default for PseudoHuberObjective {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Objective for PseudoHuberObjective {
    fn link(&self) -> Link {
        Link::Identity
    }

    fn compute_gradients(
        &self,
        n_rows: usize,
        n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
        gradients: &mut [f32],
        hessians: &mut [f32],
    ) {
        validate_objective_inputs(
            n_rows,
            n_outputs,
            scores.len(),
            gradients.len(),
            hessians.len(),
            weights,
        );
        debug_assert_eq!(n_outputs, 1);

        let inv_delta_sq = 1.0 / (self.delta * self.delta);
        for (i, w) in weight_iter(weights, n_rows).enumerate() {
            let r = scores[i] - targets[i];
            let scale = 1.0 + r * r * inv_delta_sq;
            let root = scale.sqrt();
            gradients[i] = w * r / root;
            hessians[i] = w / (scale * root);
        }
    }

    fn metric_sum(
        &self,
        n_rows: usize,
        _n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
    ) -> f64 {
        let delta_sq = (self.delta as f64) * (self.delta as f64);
        scores[..n_rows]
            .iter()
            .zip(&targets[..n_rows])
            .zip(weight_iter(weights, n_rows))
            .map(|((&s, &t), w)| {
                let r = (s - t) as f64;
                w as f64 * delta_sq * ((1.0 + r * r / delta_sq).sqrt() - 1.0)
            })
            .sum()
    }

    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]) {
        outputs[0] = weighted_mean(n_rows, targets, weights) as f32;
    }

    fn name(&self) -> &'static str {
        "pseudo_huber"
    }
}

// =============================================================================
// Poisson deviance
// =============================================================================

/// Poisson regression for non-negative count targets.
///
/// Scores are log-rates: `rate = exp(score)`.
/// - Gradient: `exp(score) - target`
/// - Hessian: `exp(score)`
/// - Metric: per-sample deviance terms `t*ln(t/rate) - (t - rate)`;
///   [`finish_metric`](Objective::finish_metric) doubles the weighted mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonDevianceObjective;

impl Objective for PoissonDevianceObjective {
    fn link(&self) -> Link {
        Link::Log
    }

    fn compute_gradients(
        &self,
        n_rows: usize,
        n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
        gradients: &mut [f32],
        hessians: &mut [f32],
    ) {
        validate_objective_inputs(
            n_rows,
            n_outputs,
            scores.len(),
            gradients.len(),
            hessians.len(),
            weights,
        );
        debug_assert_eq!(n_outputs, 1);

        for (i, w) in weight_iter(weights, n_rows).enumerate() {
            let rate = scores[i].exp();
            gradients[i] = w * (rate - targets[i]);
            hessians[i] = (w * rate).max(super::HESS_MIN);
        }
    }

    fn metric_sum(
        &self,
        n_rows: usize,
        _n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
    ) -> f64 {
        scores[..n_rows]
            .iter()
            .zip(&targets[..n_rows])
            .zip(weight_iter(weights, n_rows))
            .map(|((&s, &t), w)| {
                let rate = (s as f64).exp();
                let t = t as f64;
                // t * ln(t / rate) -> 0 as t -> 0
                let term = if t > 0.0 {
                    t * (t / rate).ln() - (t - rate)
                } else {
                    rate
                };
                w as f64 * term
            })
            .sum()
    }

    fn finish_metric(&self, mean_metric: f64) -> f64 {
        2.0 * mean_metric
    }

    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]) {
        let mean = weighted_mean(n_rows, targets, weights).max(1e-7);
        outputs[0] = mean.ln() as f32;
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), ComputeError> {
        for (sample, &t) in targets.iter().enumerate() {
            if !t.is_finite() {
                return Err(ComputeError::InvalidTarget {
                    sample,
                    reason: "target is not finite".into(),
                });
            }
            if t < 0.0 {
                return Err(ComputeError::InvalidTarget {
                    sample,
                    reason: format!("Poisson target must be non-negative, got {t}"),
                });
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "poisson_deviance"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rmse_gradients() {
        let obj = RmseObjective;
        let scores = [1.0f32, 2.0, 3.0];
        let targets = [0.5f32, 2.5, 2.5];
        let mut grads = [0.0f32; 3];
        let mut hess = [0.0f32; 3];

        obj.compute_gradients(3, 1, &scores, &targets, &[], &mut grads, &mut hess);

        assert_relative_eq!(grads[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(grads[1], -0.5, epsilon = 1e-6);
        assert_relative_eq!(grads[2], 0.5, epsilon = 1e-6);
        assert!(hess.iter().all(|&h| (h - 1.0).abs() < 1e-6));
    }

    #[test]
    fn rmse_weighted_gradients() {
        let obj = RmseObjective;
        let scores = [1.0f32, 2.0];
        let targets = [0.5f32, 2.5];
        let weights = [2.0f32, 0.5];
        let mut grads = [0.0f32; 2];
        let mut hess = [0.0f32; 2];

        obj.compute_gradients(2, 1, &scores, &targets, &weights, &mut grads, &mut hess);

        assert_relative_eq!(grads[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(grads[1], -0.25, epsilon = 1e-6);
        assert_relative_eq!(hess[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(hess[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn rmse_metric_matches_closed_form() {
        let obj = RmseObjective;
        let scores = [1.0f32, 3.0];
        let targets = [0.0f32, 0.0];

        // Squared errors: 1 and 9; mean 5; rmse sqrt(5).
        let sum = obj.metric_sum(2, 1, &scores, &targets, &[]);
        assert_relative_eq!(sum, 10.0, epsilon = 1e-9);
        assert_relative_eq!(obj.finish_metric(sum / 2.0), 5.0f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn rmse_base_score_is_weighted_mean() {
        let obj = RmseObjective;
        let targets = [1.0f32, 3.0];
        let weights = [3.0f32, 1.0];
        let mut out = [0.0f32];
        obj.base_score(2, &targets, &weights, &mut out);
        assert_relative_eq!(out[0], 1.5, epsilon = 1e-6);
    }

    #[test]
    fn pseudo_huber_limits() {
        // Small residual: behaves like squared error (grad ~ r, hess ~ 1).
        let obj = PseudoHuberObjective::new(1.0);
        let mut grads = [0.0f32];
        let mut hess = [0.0f32];
        obj.compute_gradients(1, 1, &[0.01], &[0.0], &[], &mut grads, &mut hess);
        assert_relative_eq!(grads[0], 0.01, epsilon = 1e-4);
        assert_relative_eq!(hess[0], 1.0, epsilon = 1e-3);

        // Large residual: gradient saturates near delta.
        obj.compute_gradients(1, 1, &[100.0], &[0.0], &[], &mut grads, &mut hess);
        assert_relative_eq!(grads[0], 1.0, epsilon = 1e-3);
        assert!(hess[0] < 1e-4);
    }

    #[test]
    fn poisson_gradients_and_deviance() {
        let obj = PoissonDevianceObjective;
        let scores = [0.0f32]; // rate = 1
        let targets = [2.0f32];
        let mut grads = [0.0f32];
        let mut hess = [0.0f32];

        obj.compute_gradients(1, 1, &scores, &targets, &[], &mut grads, &mut hess);
        assert_relative_eq!(grads[0], -1.0, epsilon = 1e-6);
        assert_relative_eq!(hess[0], 1.0, epsilon = 1e-6);

        // Deviance at t=2, rate=1: 2*ln(2) - 1.
        let sum = obj.metric_sum(1, 1, &scores, &targets, &[]);
        assert_relative_eq!(sum, 2.0 * 2.0f64.ln() - 1.0, epsilon = 1e-9);

        // Perfect fit has zero deviance.
        let sum = obj.metric_sum(1, 1, &[2.0f32.ln()], &targets, &[]);
        assert_relative_eq!(sum, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn poisson_zero_target() {
        let obj = PoissonDevianceObjective;
        // t=0, rate=e: term is the rate itself.
        let sum = obj.metric_sum(1, 1, &[1.0f32], &[0.0f32], &[]);
        assert_relative_eq!(sum, std::f64::consts::E, epsilon = 1e-6);
    }

    #[test]
    fn poisson_rejects_negative_targets() {
        let obj = PoissonDevianceObjective;
        let err = obj.validate_targets(&[1.0, -0.5]).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidTarget { sample: 1, .. }));
    }
}
