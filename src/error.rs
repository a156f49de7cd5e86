//! Error types for the compute engine.

/// Errors returned by engine construction and update application.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("unknown objective: {0:?}")]
    UnknownObjective(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("{what} length mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("bin index {bin} out of range for sample {sample} (term has {n_bins} bins)")]
    BinOutOfRange {
        sample: usize,
        bin: u32,
        n_bins: usize,
    },

    #[error("invalid target for sample {sample}: {reason}")]
    InvalidTarget { sample: usize, reason: String },

    #[error("engine requires at least one sample")]
    EmptyDataset,
}

impl ComputeError {
    /// Whether the caller can correct the input and retry the operation.
    ///
    /// Shape and parameter errors are reported before any state mutation, so
    /// the session stays usable. Target errors are not recoverable: the
    /// session was constructed over the offending data.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ComputeError::UnknownObjective(_)
            | ComputeError::InvalidParameter { .. }
            | ComputeError::ShapeMismatch { .. }
            | ComputeError::BinOutOfRange { .. } => true,
            ComputeError::InvalidTarget { .. } | ComputeError::EmptyDataset => false,
        }
    }
}
