//! Objective functions: gradients, hessians, and metrics.
//!
//! An objective owns the loss-specific math of the engine. During training
//! it turns scores and targets into per-sample gradients and hessians;
//! during validation it accumulates a weighted metric sum, which
//! [`Objective::finish_metric`] later reduces to the reported value.
//!
//! # Layout
//!
//! Scores, gradients, and hessians are **column-major**:
//! `scores[output * n_rows + row]`. Targets are always one column of length
//! `n_rows`; multiclass objectives read them as class indices.
//!
//! # Weighted computation
//!
//! All objectives accept sample weights; an empty slice means unweighted.
//!
//! # Available objectives
//!
//! ## Regression
//! - [`RmseObjective`]: squared error, identity link
//! - [`PseudoHuberObjective`]: robust regression with configurable delta
//! - [`PoissonDevianceObjective`]: count regression, log link
//!
//! ## Classification
//! - [`LogLossObjective`]: binary cross-entropy, logit link
//! - [`MulticlassLogLossObjective`]: multinomial cross-entropy

mod classification;
mod regression;

pub use classification::{LogLossObjective, MulticlassLogLossObjective};
pub use regression::{PoissonDevianceObjective, PseudoHuberObjective, RmseObjective};

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::link::Link;

// Re-export for objective implementations.
pub(crate) use crate::utils::weight_iter;

/// Floor applied where an objective's hessian can vanish, keeping Newton
/// steps bounded.
pub(crate) const HESS_MIN: f32 = 1e-6;

/// Validate objective input shapes.
///
/// Panics with a descriptive message on violation; shape checking against
/// user input happens earlier, in the engine.
#[inline]
fn validate_objective_inputs(
    n_rows: usize,
    n_outputs: usize,
    scores_len: usize,
    grads_len: usize,
    hess_len: usize,
    weights: &[f32],
) {
    assert!(
        n_rows > 0 && n_outputs > 0,
        "n_rows ({}) and n_outputs ({}) must be positive",
        n_rows,
        n_outputs
    );
    let required = n_rows * n_outputs;
    assert!(
        scores_len >= required,
        "scores.len() ({}) < n_rows * n_outputs ({})",
        scores_len,
        required
    );
    assert!(
        grads_len >= required && hess_len >= required,
        "gradient/hessian buffers ({}, {}) < n_rows * n_outputs ({})",
        grads_len,
        hess_len,
        required
    );
    assert!(
        weights.is_empty() || weights.len() >= n_rows,
        "weights.len() ({}) < n_rows ({})",
        weights.len(),
        n_rows
    );
}

// =============================================================================
// Objective trait
// =============================================================================

/// A loss function driving boosting updates.
///
/// Implementations provide batch gradient/hessian computation and the metric
/// used to evaluate validation sets. Both operate on raw scores in link
/// space.
pub trait Objective: Send + Sync {
    /// Number of score columns per sample (1 except for multiclass).
    fn n_outputs(&self) -> usize {
        1
    }

    /// Link function relating scores to predictions.
    fn link(&self) -> Link;

    /// Whether this objective produces a non-trivial hessian.
    ///
    /// Objectives with constant unit hessians still fill the hessian buffer
    /// (with the sample weight), so callers can treat both cases uniformly.
    fn has_hessian(&self) -> bool {
        true
    }

    /// Compute gradients and hessians for all samples.
    ///
    /// `scores`, `gradients`, and `hessians` are column-major
    /// `[n_outputs * n_rows]`; `targets` has length `n_rows`; `weights` is
    /// empty or length `n_rows`.
    fn compute_gradients(
        &self,
        n_rows: usize,
        n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
        gradients: &mut [f32],
        hessians: &mut [f32],
    );

    /// Accumulate the weighted metric sum over all samples.
    ///
    /// The returned value is a raw sum; divide by total weight and pass the
    /// mean through [`finish_metric`](Self::finish_metric) to obtain the
    /// reported metric.
    fn metric_sum(
        &self,
        n_rows: usize,
        n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
    ) -> f64;

    /// Reduce a weighted mean metric into the final reported value.
    ///
    /// RMSE takes a square root here; Poisson deviance doubles; log loss is
    /// the identity.
    fn finish_metric(&self, mean_metric: f64) -> f64 {
        mean_metric
    }

    /// Optimal constant starting scores, one per output.
    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]);

    /// Validate targets against this objective's schema.
    fn validate_targets(&self, targets: &[f32]) -> Result<(), ComputeError> {
        match targets
            .iter()
            .position(|t| !t.is_finite())
        {
            Some(sample) => Err(ComputeError::InvalidTarget {
                sample,
                reason: "target is not finite".into(),
            }),
            None => Ok(()),
        }
    }

    /// Name of the objective, also used as the metric name in logs.
    fn name(&self) -> &'static str;
}

// =============================================================================
// ObjectiveFunction enum
// =============================================================================

/// Objective selector for configuration.
///
/// Wraps every built-in objective behind one enum so sessions can be
/// described by value (or by config string via
/// [`parse`](ObjectiveFunction::parse)) without trait objects.
///
/// # Example
///
/// ```
/// use glassboost::ObjectiveFunction;
///
/// let obj = ObjectiveFunction::parse("pseudo_huber:delta=1.5").unwrap();
/// assert_eq!(obj, ObjectiveFunction::PseudoHuber { delta: 1.5 });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ObjectiveFunction {
    /// Squared error regression, reported as RMSE.
    Rmse,
    /// Binary cross-entropy on {0, 1} targets.
    LogLoss,
    /// Multinomial cross-entropy on class-index targets.
    LogLossMulti { n_classes: usize },
    /// Poisson deviance for non-negative count targets.
    PoissonDeviance,
    /// Pseudo-Huber robust regression.
    PseudoHuber { delta: f32 },
}

impl Default for ObjectiveFunction {
    fn default() -> Self {
        Self::Rmse
    }
}

impl ObjectiveFunction {
    /// Parse a registry-style config string: `name` or `name:key=value,...`.
    ///
    /// Recognized names: `rmse`, `log_loss` (with optional `classes=K` for
    /// multiclass, K >= 3), `poisson_deviance`, `pseudo_huber` (optional
    /// `delta=...`, default 1.0).
    pub fn parse(config: &str) -> Result<Self, ComputeError> {
        let (name, params) = match config.split_once(':') {
            Some((name, params)) => (name.trim(), params),
            None => (config.trim(), ""),
        };

        let mut classes: Option<usize> = None;
        let mut delta: Option<f32> = None;
        for pair in params.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ComputeError::InvalidParameter {
                    name: "config",
                    reason: format!("expected key=value, got {pair:?}"),
                })?;
            match key.trim() {
                "classes" => {
                    classes = Some(value.trim().parse().map_err(|_| {
                        ComputeError::InvalidParameter {
                            name: "classes",
                            reason: format!("not an integer: {value:?}"),
                        }
                    })?);
                }
                "delta" => {
                    delta = Some(value.trim().parse().map_err(|_| {
                        ComputeError::InvalidParameter {
                            name: "delta",
                            reason: format!("not a number: {value:?}"),
                        }
                    })?);
                }
                other => {
                    return Err(ComputeError::InvalidParameter {
                        name: "config",
                        reason: format!("unknown parameter {other:?}"),
                    });
                }
            }
        }

        match name {
            "rmse" => Ok(Self::Rmse),
            "log_loss" => match classes {
                None => Ok(Self::LogLoss),
                Some(n_classes) if n_classes >= 3 => Ok(Self::LogLossMulti { n_classes }),
                Some(_) => Err(ComputeError::InvalidParameter {
                    name: "classes",
                    reason: "multiclass log_loss requires classes >= 3; \
                             use plain log_loss for binary"
                        .into(),
                }),
            },
            "poisson_deviance" => Ok(Self::PoissonDeviance),
            "pseudo_huber" => {
                let delta = delta.unwrap_or(1.0);
                if delta > 0.0 && delta.is_finite() {
                    Ok(Self::PseudoHuber { delta })
                } else {
                    Err(ComputeError::InvalidParameter {
                        name: "delta",
                        reason: format!("must be positive and finite, got {delta}"),
                    })
                }
            }
            other => Err(ComputeError::UnknownObjective(other.to_string())),
        }
    }

    /// Validate this selector's parameters.
    ///
    /// Config-string parsing already rejects bad parameters; this guards
    /// values built directly or deserialized.
    pub fn validate(&self) -> Result<(), ComputeError> {
        match self {
            Self::LogLossMulti { n_classes } if *n_classes < 3 => {
                Err(ComputeError::InvalidParameter {
                    name: "classes",
                    reason: format!("multiclass log_loss requires classes >= 3, got {n_classes}"),
                })
            }
            Self::PseudoHuber { delta } if !(*delta > 0.0 && delta.is_finite()) => {
                Err(ComputeError::InvalidParameter {
                    name: "delta",
                    reason: format!("must be positive and finite, got {delta}"),
                })
            }
            _ => Ok(()),
        }
    }

    fn as_dyn(&self) -> Box<dyn Objective> {
        match self {
            Self::Rmse => Box::new(RmseObjective),
            Self::LogLoss => Box::new(LogLossObjective),
            Self::LogLossMulti { n_classes } => {
                Box::new(MulticlassLogLossObjective::new(*n_classes))
            }
            Self::PoissonDeviance => Box::new(PoissonDevianceObjective),
            Self::PseudoHuber { delta } => Box::new(PseudoHuberObjective::new(*delta)),
        }
    }
}

impl Objective for ObjectiveFunction {
    fn n_outputs(&self) -> usize {
        match self {
            Self::LogLossMulti { n_classes } => *n_classes,
            _ => 1,
        }
    }

    fn link(&self) -> Link {
        match self {
            Self::Rmse | Self::PseudoHuber { .. } => Link::Identity,
            Self::LogLoss => Link::Logit,
            Self::LogLossMulti { .. } => Link::MultinomialLogit,
            Self::PoissonDeviance => Link::Log,
        }
    }

    fn has_hessian(&self) -> bool {
        self.as_dyn().has_hessian()
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
        self.as_dyn().compute_gradients(
            n_rows, n_outputs, scores, targets, weights, gradients, hessians,
        )
    }

    fn metric_sum(
        &self,
        n_rows: usize,
        n_outputs: usize,
        scores: &[f32],
        targets: &[f32],
        weights: &[f32],
    ) -> f64 {
        self.as_dyn()
            .metric_sum(n_rows, n_outputs, scores, targets, weights)
    }

    fn finish_metric(&self, mean_metric: f64) -> f64 {
        self.as_dyn().finish_metric(mean_metric)
    }

    fn base_score(&self, n_rows: usize, targets: &[f32], weights: &[f32], outputs: &mut [f32]) {
        self.as_dyn().base_score(n_rows, targets, weights, outputs)
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), ComputeError> {
        self.as_dyn().validate_targets(targets)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Rmse => "rmse",
            Self::LogLoss => "log_loss",
            Self::LogLossMulti { .. } => "log_loss_multi",
            Self::PoissonDeviance => "poisson_deviance",
            Self::PseudoHuber { .. } => "pseudo_huber",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_names() {
        assert_eq!(
            ObjectiveFunction::parse("rmse").unwrap(),
            ObjectiveFunction::Rmse
        );
        assert_eq!(
            ObjectiveFunction::parse("log_loss").unwrap(),
            ObjectiveFunction::LogLoss
        );
        assert_eq!(
            ObjectiveFunction::parse("poisson_deviance").unwrap(),
            ObjectiveFunction::PoissonDeviance
        );
    }

    #[test]
    fn parse_with_params() {
        assert_eq!(
            ObjectiveFunction::parse("log_loss:classes=5").unwrap(),
            ObjectiveFunction::LogLossMulti { n_classes: 5 }
        );
        assert_eq!(
            ObjectiveFunction::parse("pseudo_huber").unwrap(),
            ObjectiveFunction::PseudoHuber { delta: 1.0 }
        );
        assert_eq!(
            ObjectiveFunction::parse("pseudo_huber:delta=2.5").unwrap(),
            ObjectiveFunction::PseudoHuber { delta: 2.5 }
        );
    }

    #[test]
    fn parse_rejects_bad_configs() {
        assert!(matches!(
            ObjectiveFunction::parse("hinge"),
            Err(ComputeError::UnknownObjective(_))
        ));
        assert!(matches!(
            ObjectiveFunction::parse("log_loss:classes=2"),
            Err(ComputeError::InvalidParameter { name: "classes", .. })
        ));
        assert!(matches!(
            ObjectiveFunction::parse("pseudo_huber:delta=-1"),
            Err(ComputeError::InvalidParameter { name: "delta", .. })
        ));
        assert!(matches!(
            ObjectiveFunction::parse("rmse:junk"),
            Err(ComputeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn enum_outputs_and_links() {
        assert_eq!(ObjectiveFunction::Rmse.n_outputs(), 1);
        assert_eq!(
            ObjectiveFunction::LogLossMulti { n_classes: 4 }.n_outputs(),
            4
        );
        assert_eq!(ObjectiveFunction::LogLoss.link(), Link::Logit);
        assert_eq!(ObjectiveFunction::PoissonDeviance.link(), Link::Log);
    }

    #[test]
    fn serde_roundtrip() {
        let obj = ObjectiveFunction::LogLossMulti { n_classes: 3 };
        let json = serde_json::to_string(&obj).unwrap();
        assert_eq!(json, r#"{"name":"log_loss_multi","n_classes":3}"#);
        let back: ObjectiveFunction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn enum_delegates_gradients() {
        let obj = ObjectiveFunction::Rmse;
        let scores = [1.0f32, 2.0, 3.0];
        let targets = [0.5f32, 2.5, 2.5];
        let mut grads = [0.0f32; 3];
        let mut hess = [0.0f32; 3];

        obj.compute_gradients(3, 1, &scores, &targets, &[], &mut grads, &mut hess);

        assert!((grads[0] - 0.5).abs() < 1e-6);
        assert!((grads[1] - -0.5).abs() < 1e-6);
        assert!((hess[0] - 1.0).abs() < 1e-6);
    }
}
