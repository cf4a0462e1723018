//! Nested-optimization tracking for a single experiment process
//!
//! - Step, iteration and evaluation counters across the nested loops
//! - Best-so-far bookkeeping at the outer and reevaluation levels
//! - Time split between primary search and reevaluation
//! - Append-only CSV result log

mod nested;
mod record;
mod result_log;

pub use nested::{
    percent_survival, NestedOptimization, ObservationOutcome, Phase, ReevalOutcome, TrackerMode,
};
pub use record::{read_log, Level, LogRecord, LOG_HEADER};
pub use result_log::{ResultFileMode, ResultLog};
