//! Structured progress logging for boosting sessions.

use serde::{Deserialize, Serialize};

/// Logging verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// No output.
    #[default]
    Silent,
    /// Session lifecycle and per-round metrics.
    Info,
    /// Everything, including per-update detail.
    Debug,
}

/// Logger used by the engine to report session progress.
///
/// Writes to stderr so metric output can be separated from program output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn info(&self, msg: &str) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("[glassboost] {msg}");
        }
    }

    pub fn debug(&self, msg: &str) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("[glassboost] {msg}");
        }
    }

    /// Report one boosting round's metric value.
    pub fn log_round(&self, round: u64, metric_name: &str, value: f64) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("[glassboost] round {round:>5}  {metric_name}: {value:.6}");
        }
    }
}
