//! glassboost: objective/metric compute engine for additive-model boosting.
//!
//! This crate is the numeric core of a cyclic boosting trainer for additive
//! models (EBM style). Each boosting step produces an *update tensor* for one
//! term: a per-bin vector of score deltas. [`UpdateEngine::apply_update`]
//! adds that tensor to every sample's score and then either recomputes
//! per-sample gradients and hessians (training sets) or accumulates a
//! weighted metric sum (validation sets). [`UpdateEngine::finish_metric`]
//! reduces an accumulated sum into the final reported metric value.
//!
//! Tree growing, histogram construction, and the outer boosting loop live in
//! the caller; this crate only owns the per-step numeric work.
//!
//! # Example
//!
//! ```
//! use glassboost::{EngineParams, ObjectiveFunction, TermUpdate, UpdateEngine};
//!
//! let params = EngineParams::builder()
//!     .objective(ObjectiveFunction::Rmse)
//!     .build()
//!     .unwrap();
//! let targets = vec![1.0, 2.0, 3.0, 4.0];
//! let mut engine = UpdateEngine::new(params, targets, Vec::new()).unwrap();
//!
//! // One term with 2 bins; samples 0,1 fall in bin 0 and samples 2,3 in bin 1.
//! let bins = [0u32, 0, 1, 1];
//! let tensor = [0.5f32, -0.5];
//! let update = TermUpdate::new(&bins, &tensor, 2);
//! engine.apply_update(&update).unwrap();
//! ```

pub mod error;
pub mod gradients;
pub mod kernel;
pub mod link;
pub mod logger;
pub mod objective;
pub mod update;

mod utils;

pub use error::ComputeError;
pub use gradients::Gradients;
pub use kernel::KernelKind;
pub use link::Link;
pub use logger::{TrainingLogger, Verbosity};
pub use objective::{Objective, ObjectiveFunction};
pub use update::{EngineParams, EngineParamsBuilder, TermUpdate, UpdateEngine};
