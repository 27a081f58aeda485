//! The selection engine: beam search, cross-validation, and the Monte-Carlo
//! permutation test.

pub mod cross_validation;
pub mod feature_set;
pub mod mcpt;
pub mod selector;

pub use cross_validation::CrossValidator;
pub use feature_set::FeatureSet;
pub use selector::{SelectionOutcome, SelectionStep, StepwiseSelector};
