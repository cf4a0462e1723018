//! Experiment parameters and the grids batch drivers walk through

mod grid;
mod kind;
mod parameters;

pub use grid::{ParameterGrid, TuningGrid};
pub use kind::ExperimentKind;
pub use parameters::Parameters;
