//! Crash-resumable record of which batch indices have completed
//!
//! The progress file is the only durable state. It is a small RON document:
//!
//! ```text
//! (
//!     total_count: 10,
//!     completed: [2, 5, 7],
//! )
//! ```
//!
//! Every update is written to a temp file, synced and renamed over the old
//! file, so a killed batch driver leaves either the old or the new version.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressState {
    total_count: usize,
    completed: BTreeSet<usize>,
}

/// Tracks completed indices of a batch of `total_count` independent runs
#[derive(Debug)]
pub struct ExperimentProgressTracker {
    path: PathBuf,
    total_count: usize,
    completed: BTreeSet<usize>,
    done: bool,
}

impl ExperimentProgressTracker {
    /// Load prior completions from `path` if it exists.
    ///
    /// Indices below `start_index` count as complete, so the schedule begins
    /// at `start_index`.
    pub fn new(path: impl Into<PathBuf>, start_index: usize, total_count: usize) -> Result<Self> {
        let path = path.into();

        let mut completed = if path.exists() {
            let state = load_state(&path)?;
            if state.total_count != total_count {
                log::warn!(
                    "Progress file {} was written for {} indices, now {}",
                    path.display(),
                    state.total_count,
                    total_count
                );
            }
            if let Some(&index) = state.completed.iter().find(|&&i| i >= total_count) {
                return Err(TrackerError::ProgressParse {
                    path,
                    message: format!(
                        "completed index {} outside of 0..{}",
                        index, total_count
                    ),
                });
            }
            log::info!(
                "Resuming from {}: {} of {} indices complete",
                path.display(),
                state.completed.len(),
                total_count
            );
            state.completed
        } else {
            BTreeSet::new()
        };

        completed.extend(0..start_index.min(total_count));

        let done = completed.len() >= total_count;
        Ok(Self {
            path,
            total_count,
            completed,
            done,
        })
    }

    /// True once every index is complete
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Smallest index not yet complete
    pub fn get_next_index(&self) -> Result<usize> {
        if self.done {
            return Err(TrackerError::ExhaustedRange {
                total: self.total_count,
            });
        }
        (0..self.total_count)
            .find(|i| !self.completed.contains(i))
            .ok_or(TrackerError::ExhaustedRange {
                total: self.total_count,
            })
    }

    /// Mark `index` complete and persist before returning
    pub fn mark_index_done(&mut self, index: usize) -> Result<()> {
        if index >= self.total_count {
            return Err(TrackerError::IndexOutOfRange {
                index,
                total: self.total_count,
            });
        }

        let mut completed = self.completed.clone();
        completed.insert(index);
        save_state(
            &self.path,
            &ProgressState {
                total_count: self.total_count,
                completed: completed.clone(),
            },
        )?;

        self.completed = completed;
        self.done = self.done || self.completed.len() >= self.total_count;
        log::debug!(
            "Index {} done ({}/{})",
            index,
            self.completed.len(),
            self.total_count
        );
        Ok(())
    }

    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn remaining(&self) -> usize {
        self.total_count.saturating_sub(self.completed.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_state(path: &Path) -> Result<ProgressState> {
    let contents = std::fs::read_to_string(path).map_err(|e| TrackerError::io(path, e))?;
    ron::from_str(&contents).map_err(|e| TrackerError::ProgressParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn save_state(path: &Path, state: &ProgressState) -> Result<()> {
    let serialized = ron::ser::to_string_pretty(state, Default::default()).map_err(|e| {
        TrackerError::ProgressParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| TrackerError::io(parent, e))?;
        }
    }

    // Atomic write: write to temp file, then rename
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(|e| TrackerError::io(&temp_path, e))?;
    file.write_all(serialized.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| TrackerError::io(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| TrackerError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_tracker_starts_at_zero() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let prog = ExperimentProgressTracker::new(dir.path().join("progress.ron"), 0, 3)?;
        assert!(!prog.is_done());
        assert_eq!(prog.get_next_index()?, 0);
        assert_eq!(prog.remaining(), 3);
        Ok(())
    }

    #[test]
    fn test_start_index_skips_earlier_indices() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let prog = ExperimentProgressTracker::new(dir.path().join("progress.ron"), 2, 5)?;
        assert_eq!(prog.get_next_index()?, 2);
        Ok(())
    }

    #[test]
    fn test_mark_out_of_range_rejected() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.ron");
        let mut prog = ExperimentProgressTracker::new(&path, 0, 3)?;
        assert!(matches!(
            prog.mark_index_done(3),
            Err(TrackerError::IndexOutOfRange { index: 3, total: 3 })
        ));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_done_after_all_marked() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let mut prog = ExperimentProgressTracker::new(dir.path().join("progress.ron"), 0, 2)?;
        prog.mark_index_done(1)?;
        assert_eq!(prog.get_next_index()?, 0);
        prog.mark_index_done(0)?;
        assert!(prog.is_done());
        assert!(matches!(
            prog.get_next_index(),
            Err(TrackerError::ExhaustedRange { total: 2 })
        ));
        // Marking again keeps it done
        prog.mark_index_done(0)?;
        assert!(prog.is_done());
        Ok(())
    }

    #[test]
    fn test_progress_file_is_readable_ron() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.ron");
        let mut prog = ExperimentProgressTracker::new(&path, 0, 4)?;
        prog.mark_index_done(2)?;
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("total_count: 4"));
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn test_corrupt_progress_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.ron");
        std::fs::write(&path, "(total_count: 4, completed: [1,").unwrap();
        assert!(matches!(
            ExperimentProgressTracker::new(&path, 0, 4),
            Err(TrackerError::ProgressParse { .. })
        ));
    }

    #[test]
    fn test_completed_index_outside_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.ron");
        std::fs::write(&path, "(total_count: 10, completed: [8])").unwrap();
        assert!(ExperimentProgressTracker::new(&path, 0, 5).is_err());
    }
}
