//! Health classification
//!
//! Maps the age of a source's last activity into a coarse [`HealthStatus`].

pub mod evaluator;

pub use evaluator::{classify, HealthEvaluator, HealthThresholds};
