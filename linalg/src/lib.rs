//! Numerical substrate for stepwise feature selection.
//!
//! This crate provides the dense, column-major [`matrix::DataMatrix`], the
//! linear-quadratic [`design`] expansion with its fixed term order, adaptive
//! least-squares [`solver`]s, and the [`model::LinearQuadraticModel`] that
//! ties them together with a cached full-data design matrix for fast
//! cross-validation fold extraction.

pub mod design;
pub mod matrix;
pub mod model;
pub mod solver;
