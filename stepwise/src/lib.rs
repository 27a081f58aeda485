//! Enhanced stepwise feature selection for regression problems.
//!
//! Given a matrix of candidate predictors and a numeric target, the engine
//! greedily builds nested subsets of features whose cross-validated
//! predictive power is highest, attaching per-step significance estimates
//! via Monte-Carlo permutation testing. The search keeps a beam of the
//! top-K partial feature sets, grows them one feature at a time, and stops
//! on improvement exhaustion or caller limits.
//!
//! [`engine::EnhancedStepwise`] is the entry point; models plug in through
//! [`model::RegressionModel`].

pub use stepwise_linalg as linalg;

pub mod config;
pub mod engine;
pub mod model;
pub mod reader;
pub mod selection;
pub mod util;
