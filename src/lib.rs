//! Signal durations and finite-difference sensitivity coefficients of
//! simulated signaling metrics.

pub mod config;
pub mod duration;
pub mod manager;
pub mod metric;
pub mod sensitivity;

pub use duration::duration;
pub use sensitivity::{SensitivityParams, compute_sensitivity_coefficients};
