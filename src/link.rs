//! Link functions mapping additive scores to prediction space.
//!
//! Every objective declares a [`Link`]. Scores accumulated by the engine live
//! in link space (log-odds, log-rate, raw value); predictions handed back to
//! the user go through the inverse link.

use serde::{Deserialize, Serialize};

/// Link function of an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Raw scores are predictions (regression).
    Identity,
    /// Scores are log-odds; predictions are probabilities via sigmoid.
    Logit,
    /// Scores are log-rates; predictions via exp.
    Log,
    /// Scores are per-class logits; predictions via softmax over outputs.
    MultinomialLogit,
}

impl Link {
    /// Inverse link for a single score: score space to prediction space.
    ///
    /// [`Link::MultinomialLogit`] has no per-element inverse; use
    /// [`softmax_inplace`] over one sample's class scores instead.
    #[inline]
    pub fn inverse(&self, score: f64) -> f64 {
        match self {
            Link::Identity | Link::MultinomialLogit => score,
            Link::Logit => 1.0 / (1.0 + (-score).exp()),
            Link::Log => score.exp(),
        }
    }

    /// Forward link for a single prediction: prediction space to score space.
    #[inline]
    pub fn forward(&self, prediction: f64) -> f64 {
        match self {
            Link::Identity | Link::MultinomialLogit => prediction,
            Link::Logit => (prediction / (1.0 - prediction)).ln(),
            Link::Log => prediction.ln(),
        }
    }
}

/// Sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax in-place over one sample's class scores.
///
/// Subtracts the max before exponentiation for numerical stability.
pub fn softmax_inplace(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }

    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for val in values.iter_mut() {
        *val = (*val - max_val).exp();
        sum += *val;
    }

    if sum > 0.0 {
        for val in values.iter_mut() {
            *val /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_values() {
        assert_relative_eq!(sigmoid(0.0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(sigmoid(2.0), 0.8807971, epsilon = 1e-5);
        assert_relative_eq!(sigmoid(-2.0), 0.1192029, epsilon = 1e-5);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut values = vec![1.0, 2.0, 3.0];
        softmax_inplace(&mut values);
        let sum: f32 = values.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        assert!(values[2] > values[1] && values[1] > values[0]);
    }

    #[test]
    fn softmax_numerical_stability() {
        // Values that would overflow exp without max subtraction.
        let mut values = vec![1000.0, 1001.0, 1002.0];
        softmax_inplace(&mut values);
        let sum: f32 = values.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn link_roundtrip() {
        for link in [Link::Identity, Link::Logit, Link::Log] {
            let p = match link {
                Link::Logit => 0.3,
                _ => 2.5,
            };
            assert_relative_eq!(link.inverse(link.forward(p)), p, epsilon = 1e-12);
        }
    }

    #[test]
    fn link_serde_names() {
        let json = serde_json::to_string(&Link::MultinomialLogit).unwrap();
        assert_eq!(json, "\"multinomial_logit\"");
    }
}
