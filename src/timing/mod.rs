//! Wall-clock bookkeeping
//!
//! - Pausable stopwatches for splitting time between search and reevaluation
//! - Clock sources (system, manual)
//! - Human-readable duration formatting for progress reports

mod clock;
mod duration_fmt;
mod stopwatch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duration_fmt::format_duration;
pub use stopwatch::Stopwatch;
