//! # evotrack - Nested Optimization Progress Tracking
//!
//! Bookkeeping for evolutionary-robotics experiments that wrap an outer
//! morphology search around an inner controller-training loop, and for the
//! long, restartable batches those experiments run in.

pub mod batch;
pub mod config;
pub mod error;
pub mod params;
pub mod progress;
pub mod simulate;
pub mod timing;
pub mod tracker;

pub use error::{Result, TrackerError};

/// Common imports for experiment drivers
pub mod prelude {
    pub use crate::params::{ExperimentKind, Parameters};
    pub use crate::progress::ExperimentProgressTracker;
    pub use crate::timing::Stopwatch;
    pub use crate::tracker::{
        NestedOptimization, ObservationOutcome, ResultFileMode, TrackerMode,
    };
}
