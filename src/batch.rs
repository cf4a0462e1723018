//! Batch driver: run every index of a parameter grid, one process each
//!
//! Completed indices are persisted after every successful run, so a killed
//! driver restarted with the same progress file skips finished work and
//! retries the rest in increasing index order. A failed run halts the batch.

use std::process::Command;

use indicatif::{ProgressBar, ProgressStyle};
use web_time::Instant;

use crate::error::{Result, TrackerError};
use crate::progress::{ExperimentProgressTracker, ProgressReport};

/// How one run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchResult {
    pub success: bool,
    /// Human-readable exit status
    pub status: String,
}

/// Starts the run for a batch index and waits for it to finish
pub trait Launcher {
    fn launch(&mut self, index: usize) -> Result<LaunchResult>;
}

impl<F> Launcher for F
where
    F: FnMut(usize) -> Result<LaunchResult>,
{
    fn launch(&mut self, index: usize) -> Result<LaunchResult> {
        self(index)
    }
}

/// Runs a shell command template, replacing `{index}` with the batch index
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    template: String,
}

impl ShellLauncher {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn command_for(&self, index: usize) -> String {
        self.template.replace("{index}", &index.to_string())
    }
}

impl Launcher for ShellLauncher {
    fn launch(&mut self, index: usize) -> Result<LaunchResult> {
        let command = self.command_for(index);
        log::info!("Launching index {}: {}", index, command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .status()
            .map_err(|e| TrackerError::io("sh", e))?;
        Ok(LaunchResult {
            success: status.success(),
            status: status.to_string(),
        })
    }
}

/// Summary of a batch invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Indices run successfully by this invocation, in order
    pub launched: Vec<usize>,
    /// Indices that were already complete when the driver started
    pub skipped: usize,
}

/// Drives an [`ExperimentProgressTracker`] to completion
pub struct BatchDriver {
    progress: ExperimentProgressTracker,
    report: Option<ProgressReport>,
    show_progress: bool,
}

impl BatchDriver {
    pub fn new(progress: ExperimentProgressTracker) -> Self {
        Self {
            progress,
            report: None,
            show_progress: true,
        }
    }

    /// Also append per-index lines to a text report
    pub fn with_report(mut self, report: ProgressReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Show or hide the terminal progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn progress(&self) -> &ExperimentProgressTracker {
        &self.progress
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.progress.total_count() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Launch every incomplete index until the batch is done or a run fails
    pub fn run(&mut self, launcher: &mut dyn Launcher) -> Result<BatchSummary> {
        let total = self.progress.total_count();
        let mut summary = BatchSummary {
            launched: Vec::new(),
            skipped: self.progress.completed().len(),
        };

        let pb = self.progress_bar();
        pb.set_position(summary.skipped as u64);
        pb.println(format!(
            "Batch of {} runs, {} already complete",
            total, summary.skipped
        ));

        // Estimates cover the runs this invocation owns
        let session_total = total.saturating_sub(summary.skipped);
        let started = Instant::now();
        while !self.progress.is_done() {
            let index = self.progress.get_next_index()?;
            pb.set_message(format!("index {}", index));

            let result = launcher.launch(index)?;
            let elapsed = started.elapsed().as_secs_f64();

            if !result.success {
                pb.abandon_with_message(format!("index {} failed", index));
                if let Some(report) = &self.report {
                    if let Err(e) = report.record_failure(
                        index,
                        summary.launched.len(),
                        session_total,
                        elapsed,
                        &result.status,
                    ) {
                        log::warn!("Failed to update progress report: {}", e);
                    }
                }
                log::error!("Run {} failed with {}, halting batch", index, result.status);
                return Err(TrackerError::ChildFailed {
                    index,
                    status: result.status,
                });
            }

            self.progress.mark_index_done(index)?;
            summary.launched.push(index);
            pb.inc(1);

            if let Some(report) = &self.report {
                if let Err(e) =
                    report.record_done(index, summary.launched.len(), session_total, elapsed)
                {
                    log::warn!("Failed to update progress report: {}", e);
                }
            }
        }

        pb.finish_with_message("Batch complete!");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(dir: &tempfile::TempDir, total: usize) -> BatchDriver {
        let progress =
            ExperimentProgressTracker::new(dir.path().join("progress.ron"), 0, total).unwrap();
        BatchDriver::new(progress).with_progress_bar(false)
    }

    fn ok() -> Result<LaunchResult> {
        Ok(LaunchResult {
            success: true,
            status: "exit status: 0".to_string(),
        })
    }

    #[test]
    fn test_runs_all_indices_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut seen = Vec::new();
        let mut launcher = |i: usize| -> Result<LaunchResult> {
            seen.push(i);
            ok()
        };
        let summary = driver(&dir, 4).run(&mut launcher).unwrap();
        assert_eq!(summary.launched, vec![0, 1, 2, 3]);
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_failure_halts_and_keeps_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut launcher = |i: usize| -> Result<LaunchResult> {
            Ok(LaunchResult {
                success: i != 2,
                status: format!("exit status: {}", if i == 2 { 1 } else { 0 }),
            })
        };
        let err = driver(&dir, 5).run(&mut launcher).unwrap_err();
        assert!(matches!(err, TrackerError::ChildFailed { index: 2, .. }));

        // Restart resumes at the failed index
        let mut retried = Vec::new();
        let mut launcher = |i: usize| -> Result<LaunchResult> {
            retried.push(i);
            ok()
        };
        let summary = driver(&dir, 5).run(&mut launcher).unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(retried, vec![2, 3, 4]);
    }

    #[test]
    fn test_shell_launcher_substitutes_index() {
        let launcher = ShellLauncher::new("run --index {index} --again {index}");
        assert_eq!(launcher.command_for(7), "run --index 7 --again 7");
    }

    #[test]
    fn test_shell_launcher_reports_exit_status() {
        let mut ok = ShellLauncher::new("exit 0");
        assert!(ok.launch(0).unwrap().success);
        let mut failing = ShellLauncher::new("exit {index}");
        assert!(!failing.launch(3).unwrap().success);
    }
}
