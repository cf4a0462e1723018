//! Error types for tracker, progress and batch operations

use std::path::PathBuf;

/// Errors surfaced by the tracking layer.
///
/// All of these are precondition violations or I/O failures. Budget
/// exhaustion is not an error and is reported through
/// [`crate::tracker::ObservationOutcome::BudgetExhausted`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Invalid objective value: {value} (objective must be a number)")]
    InvalidObjective { value: f64 },

    #[error("Index {index} out of range (total count {total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("All {total} indices are already complete")]
    ExhaustedRange { total: usize },

    #[error("Reevaluation result recorded while not reevaluating")]
    NotReevaluating,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse progress file {}: {message}", .path.display())]
    ProgressParse { path: PathBuf, message: String },

    #[error("Failed to parse result log row {line}: {message}")]
    RecordParse { line: usize, message: String },

    #[error("Result log lock poisoned")]
    LockPoisoned,

    #[error("Run for index {index} failed with {status}")]
    ChildFailed { index: usize, status: String },
}

impl TrackerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
