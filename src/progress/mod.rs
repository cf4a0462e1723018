//! Restartable bookkeeping for batches of experiment runs

mod report;
mod tracker;

pub use report::{estimate_time_left, ProgressReport};
pub use tracker::ExperimentProgressTracker;
