//! Numeric smoothing for acquired samples.
pub mod rate;
pub mod rolling;
