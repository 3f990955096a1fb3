//! Random Forest classification: bagged CART trees with prefix prediction.
//!
//! Trains an ensemble of CART decision trees on bootstrap samples with
//! per-split feature subsampling, in parallel via rayon. A fitted
//! [`RandomForest`] can predict with only its first `n` trees, and a
//! [`ForestGrower`] extends a forest one tree at a time (warm start).

mod config;
mod confusion;
mod error;
mod forest;
mod grow;
mod node;
mod predict;
mod split;
mod training;
mod tree;

pub use config::RandomForestConfig;
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::RfError;
pub use forest::RandomForest;
pub use grow::ForestGrower;
pub use split::Criterion;
