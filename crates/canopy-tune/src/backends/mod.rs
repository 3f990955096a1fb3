//! The two [`ClassifierBackend`](crate::ClassifierBackend) implementations.

mod bagged_linfa;
mod native;

pub use bagged_linfa::{LinfaBackend, LinfaForest, LinfaGrower};
pub use native::{NativeBackend, NativeGrower, NativeModel};
