//! CSV rows of the per-run result log

use std::fmt;
use std::path::Path;

use crate::error::{Result, TrackerError};

/// Header line written once at the top of every result log
pub const LOG_HEADER: &str =
    "level,evaluation,f_best,f,time,time_including_reeval,step,step_including_reeval";

/// Nesting level a record was produced at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Outer-loop observation
    Outer,
    /// Reevaluation of a new outer best
    Reeval,
}

impl Level {
    pub fn code(self) -> u8 {
        match self {
            Level::Outer => 2,
            Level::Reeval => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(Level::Outer),
            3 => Some(Level::Reeval),
            _ => None,
        }
    }
}

/// One data row of the result log
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub evaluation: u64,
    pub f_best: f64,
    pub f: f64,
    /// Primary stopwatch seconds
    pub time: f64,
    /// Primary plus reevaluation stopwatch seconds
    pub time_including_reeval: f64,
    pub step: u64,
    pub step_including_reeval: u64,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{}",
            self.level.code(),
            self.evaluation,
            self.f_best,
            self.f,
            self.time,
            self.time_including_reeval,
            self.step,
            self.step_including_reeval
        )
    }
}

impl LogRecord {
    /// Parse one data row. `line` is the 1-based line number used in errors.
    pub fn parse_row(row: &str, line: usize) -> Result<Self> {
        let fields: Vec<&str> = row.trim_end().split(',').collect();
        if fields.len() != 8 {
            return Err(TrackerError::RecordParse {
                line,
                message: format!("expected 8 fields, found {}", fields.len()),
            });
        }

        fn field<T: std::str::FromStr>(value: &str, name: &str, line: usize) -> Result<T> {
            value.trim().parse().map_err(|_| TrackerError::RecordParse {
                line,
                message: format!("invalid {} '{}'", name, value),
            })
        }

        let code: u8 = field(fields[0], "level", line)?;
        let level = Level::from_code(code).ok_or_else(|| TrackerError::RecordParse {
            line,
            message: format!("unknown level {}", code),
        })?;

        Ok(Self {
            level,
            evaluation: field(fields[1], "evaluation", line)?,
            f_best: field(fields[2], "f_best", line)?,
            f: field(fields[3], "f", line)?,
            time: field(fields[4], "time", line)?,
            time_including_reeval: field(fields[5], "time_including_reeval", line)?,
            step: field(fields[6], "step", line)?,
            step_including_reeval: field(fields[7], "step_including_reeval", line)?,
        })
    }
}

/// Read every data row of a result log, checking the header.
///
/// Blank lines and `#` comment lines are skipped. A header line repeated
/// after the first is rejected, since each file is meant to hold exactly one.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| TrackerError::io(path, e))?;

    let mut lines = content.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim_end() == LOG_HEADER => {}
        Some((_, other)) => {
            return Err(TrackerError::RecordParse {
                line: 1,
                message: format!("unexpected header '{}'", other),
            })
        }
        None => return Ok(Vec::new()),
    }

    lines
        .filter(|(_, row)| {
            let row = row.trim();
            !row.is_empty() && !row.starts_with('#')
        })
        .map(|(idx, row)| LogRecord::parse_row(row, idx + 1))
        .collect()
}
