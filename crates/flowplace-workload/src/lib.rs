//! flowplace-workload: inputs and baselines for the placement engine.
//!
//! - **`generator`**: random servers, replica layouts and affinity matrices
//! - **`baseline`**: locality-blind random placement for comparison

pub mod baseline;
pub mod generator;

pub use baseline::{RANDOM_STRATEGY, RandomPlacement};
pub use generator::{GeneratedWorkload, WorkloadGenerator};
