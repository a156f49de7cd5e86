//! Classification objectives.

use super::{validate_objective_inputs, weight_iter, Objective, HESS_MIN};
use crate::error::ComputeError;
use crate::link::{sigmoid, Link};

/// Numerically stable `ln(1 + exp(x))`.
#[inline]
fn ln_1p_exp(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

// =============================================================================
// Binary log loss
// =============================================================================

/// Binary cross-entropy on {0, 1} targets.
///
/// Scores are log-odds.
/// - Gradient: `sigmoid(score) - target`
/// - Hessian: `sigmoid(score) * (1 - sigmoid(score))`, floored
/// - Metric: `ln(1 + exp(score)) - target * score`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLossObjective;

impl Objective for LogLossObjective {
    fn link(&self) -> Link {
        Link::Logit
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
            let p = sigmoid(scores[i]);
            gradients[i] = w * (p - targets[i]);
            hessians[i] = (w * p * (1.0 - p)).max(HESS_MIN);
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
            .map(|((&s, &y), w)| {
                let s = s as f64;
                w as f64 * (ln_1p_exp(s) - y as f64 * s)
            })
            .sum()
    }

    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]) {
        let (pos_weight, total_weight) = targets[..n_rows]
            .iter()
            .zip(weight_iter(weights, n_rows))
            .fold((0.0f64, 0.0f64), |(pos, total), (&t, w)| {
                (pos + t as f64 * w as f64, total + w as f64)
            });

        let p = (pos_weight / total_weight).clamp(1e-7, 1.0 - 1e-7);
        outputs[0] = (p / (1.0 - p)).ln() as f32;
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), ComputeError> {
        for (sample, &t) in targets.iter().enumerate() {
            if t != 0.0 && t != 1.0 {
                return Err(ComputeError::InvalidTarget {
                    sample,
                    reason: format!("binary target must be 0 or 1, got {t}"),
                });
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log_loss"
    }
}

// =============================================================================
// Multiclass log loss
// =============================================================================

/// Multinomial cross-entropy; targets are class indices in `[0, n_classes)`.
///
/// Scores are per-class logits, one output column per class. Gradients per
/// class follow the softmax: `p_k - [k == target]`.
#[derive(Debug, Clone, Copy)]
pub struct MulticlassLogLossObjective {
    n_classes: usize,
}

impl MulticlassLogLossObjective {
    /// Create for `n_classes` classes.
    ///
    /// # Panics
    ///
    /// Panics if `n_classes < 3`; binary problems use [`LogLossObjective`].
    pub fn new(n_classes: usize) -> Self {
        assert!(n_classes >= 3, "multiclass log loss requires n_classes >= 3");
        Self { n_classes }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Softmax probabilities for one sample, gathered from column-major
    /// scores into `probs`.
    fn sample_probs(&self, scores: &[f32], n_rows: usize, row: usize, probs: &mut [f64]) {
        let mut max_score = f64::NEG_INFINITY;
        for (k, p) in probs.iter_mut().enumerate() {
            let s = scores[k * n_rows + row] as f64;
            *p = s;
            max_score = max_score.max(s);
        }

        let mut sum = 0.0f64;
        for p in probs.iter_mut() {
            *p = (*p - max_score).exp();
            sum += *p;
        }
        for p in probs.iter_mut() {
            *p /= sum;
        }
    }
}

impl Objective for MulticlassLogLossObjective {
    fn n_outputs(&self) -> usize {
        self.n_classes
    }

    fn link(&self) -> Link {
        Link::MultinomialLogit
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
        debug_assert_eq!(n_outputs, self.n_classes);
        debug_assert!(targets.len() >= n_rows);

        let mut probs = vec![0.0f64; self.n_classes];
        for (row, w) in weight_iter(weights, n_rows).enumerate() {
            self.sample_probs(scores, n_rows, row, &mut probs);
            let target_class = targets[row] as usize;

            for (k, &p) in probs.iter().enumerate() {
                let idx = k * n_rows + row;
                let indicator = (k == target_class) as u8 as f64;
                gradients[idx] = w * (p - indicator) as f32;
                hessians[idx] = (w * (p * (1.0 - p)) as f32).max(HESS_MIN);
            }
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
        let mut sum = 0.0f64;
        for (row, w) in weight_iter(weights, n_rows).enumerate() {
            // logsumexp(scores) - score[target]
            let mut max_score = f64::NEG_INFINITY;
            for k in 0..self.n_classes {
                max_score = max_score.max(scores[k * n_rows + row] as f64);
            }
            let mut exp_sum = 0.0f64;
            for k in 0..self.n_classes {
                exp_sum += ((scores[k * n_rows + row] as f64) - max_score).exp();
            }
            let target_class = targets[row] as usize;
            let target_score = scores[target_class * n_rows + row] as f64;

            sum += w as f64 * (max_score + exp_sum.ln() - target_score);
        }
        sum
    }

    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]) {
        // Log class priors, from weighted counts.
        let mut class_weight = vec![0.0f64; self.n_classes];
        let mut total = 0.0f64;
        for (row, w) in weight_iter(weights, n_rows).enumerate() {
            class_weight[targets[row] as usize] += w as f64;
            total += w as f64;
        }

        for (k, out) in outputs[..self.n_classes].iter_mut().enumerate() {
            let prior = (class_weight[k] / total).clamp(1e-7, 1.0 - 1e-7);
            *out = prior.ln() as f32;
        }
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), ComputeError> {
        for (sample, &t) in targets.iter().enumerate() {
            if !t.is_finite() || t.fract() != 0.0 || t < 0.0 || t as usize >= self.n_classes {
                return Err(ComputeError::InvalidTarget {
                    sample,
                    reason: format!(
                        "class index must be an integer in [0, {}), got {t}",
                        self.n_classes
                    ),
                });
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log_loss_multi"
    }
}

// =============================================================================
// Tests
// =============================================================================
