//! Human-readable batch progress report

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};
use crate::timing::format_duration;

/// Append-only text report of a batch run.
///
/// One line per finished index:
/// `{fraction}, {time_left} | {index}, {elapsed}`
#[derive(Debug, Clone)]
pub struct ProgressReport {
    path: PathBuf,
}

impl ProgressReport {
    /// Open the report and append a `start.` line. Lines of earlier
    /// sessions are kept.
    pub fn start(path: impl Into<PathBuf>) -> Result<Self> {
        let report = Self { path: path.into() };
        report.append(&format!("start. {}", chrono::Local::now().to_rfc3339()))?;
        Ok(report)
    }

    /// Append the line for a successfully finished index
    pub fn record_done(
        &self,
        index: usize,
        finished: usize,
        total: usize,
        elapsed_secs: f64,
    ) -> Result<()> {
        self.append(&progress_line(index, finished, total, elapsed_secs))
    }

    /// Append the line for an index whose run failed
    pub fn record_failure(
        &self,
        index: usize,
        finished: usize,
        total: usize,
        elapsed_secs: f64,
        status: &str,
    ) -> Result<()> {
        let line = format!(
            "FAILED {} ({}) | {}",
            index,
            status,
            progress_line(index, finished, total, elapsed_secs)
        );
        self.append(&line)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TrackerError::io(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| TrackerError::io(&self.path, e))
    }
}

/// Remaining seconds when `finished` of `total` runs took `elapsed_secs`
pub fn estimate_time_left(finished: usize, total: usize, elapsed_secs: f64) -> Option<f64> {
    if finished == 0 {
        return None;
    }
    Some((elapsed_secs / finished as f64 * total as f64 - elapsed_secs).max(0.0))
}

fn progress_line(index: usize, finished: usize, total: usize, elapsed_secs: f64) -> String {
    let fraction = if total == 0 {
        1.0
    } else {
        finished as f64 / total as f64
    };
    let left = estimate_time_left(finished, total, elapsed_secs)
        .map(format_duration)
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{:.4}, {} | {}, {}",
        fraction,
        left,
        index,
        format_duration(elapsed_secs)
    )
}
