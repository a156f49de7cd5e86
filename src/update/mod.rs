//! Boosting update application.
//!
//! [`TermUpdate`] is the bridge carrying one boosting step's inputs: the
//! term's per-sample bin indices and the update tensor of score deltas.
//! [`UpdateEngine`] owns the per-dataset state (scores, targets, weights,
//! gradients) and applies updates against it.

mod engine;

pub use engine::{EngineParams, EngineParamsBuilder, UpdateEngine};

use crate::error::ComputeError;

/// One term's boosting update: a borrowed view over bin assignments and the
/// update tensor produced by the caller's tree/histogram layer.
///
/// The tensor holds `n_bins * n_outputs` score deltas, bin-major:
/// `tensor[bin * n_outputs + output]`. An *intercept* update carries no bin
/// assignments and adds the same cell to every sample.
#[derive(Debug, Clone, Copy)]
pub struct TermUpdate<'a> {
    bins: Option<&'a [u32]>,
    tensor: &'a [f32],
    n_bins: usize,
}

impl<'a> TermUpdate<'a> {
    /// Update for a binned term: `bins[i]` selects the tensor cell added to
    /// sample `i`.
    pub fn new(bins: &'a [u32], tensor: &'a [f32], n_bins: usize) -> Self {
        Self {
            bins: Some(bins),
            tensor,
            n_bins,
        }
    }

    /// Intercept update: one tensor cell of `n_outputs` deltas, applied to
    /// every sample.
    pub fn intercept(tensor: &'a [f32]) -> Self {
        Self {
            bins: None,
            tensor,
            n_bins: 1,
        }
    }

    pub fn is_intercept(&self) -> bool {
        self.bins.is_none()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn tensor(&self) -> &'a [f32] {
        self.tensor
    }

    pub(crate) fn bins(&self) -> Option<&'a [u32]> {
        self.bins
    }

    /// Check the update against a dataset's shape before any score is
    /// touched.
    pub(crate) fn validate(&self, n_samples: usize, n_outputs: usize) -> Result<(), ComputeError> {
        if self.n_bins == 0 {
            return Err(ComputeError::InvalidParameter {
                name: "n_bins",
                reason: "term must have at least one bin".into(),
            });
        }

        let expected = self.n_bins * n_outputs;
        if self.tensor.len() != expected {
            return Err(ComputeError::ShapeMismatch {
                what: "update tensor",
                expected,
                got: self.tensor.len(),
            });
        }

        if let Some(bins) = self.bins {
            if bins.len() != n_samples {
                return Err(ComputeError::ShapeMismatch {
                    what: "bins",
                    expected: n_samples,
                    got: bins.len(),
                });
            }
            for (sample, &bin) in bins.iter().enumerate() {
                if bin as usize >= self.n_bins {
                    return Err(ComputeError::BinOutOfRange {
                        sample,
                        bin,
                        n_bins: self.n_bins,
                    });
                }
            }
        }

        Ok(())
    }
}
