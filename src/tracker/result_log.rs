//! Append-only result log shared between cooperating threads

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Result, TrackerError};

use super::record::{LogRecord, LOG_HEADER};

/// What to do with a result log left behind by an earlier run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFileMode {
    /// Keep existing rows and continue after them
    #[default]
    Append,
    /// Delete the existing file first
    Truncate,
}

#[derive(Debug)]
struct LogState {
    header_written: bool,
}

/// Handle to one CSV result log.
///
/// Clones share the same lock, so a background reevaluation thread and the
/// main training loop can both append without interleaving rows.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
    state: Arc<Mutex<LogState>>,
}

impl ResultLog {
    /// Open (lazily) the log at `path`, creating parent directories
    pub fn open(path: impl Into<PathBuf>, mode: ResultFileMode) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrackerError::io(parent, e))?;
            }
        }

        if mode == ResultFileMode::Truncate && path.exists() {
            match std::fs::remove_file(&path) {
                Ok(()) => log::info!("Removed previous results: {}", path.display()),
                Err(e) => log::warn!(
                    "Failed to remove previous results {}: {}",
                    path.display(),
                    e
                ),
            }
        }

        // A resumed run keeps the header of the file it continues
        let header_written = std::fs::metadata(&path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(LogState { header_written })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one data row, preceded by the header on the first write
    pub fn append_record(&self, record: &LogRecord) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| TrackerError::LockPoisoned)?;

        let mut chunk = String::new();
        if !state.header_written {
            chunk.push_str(LOG_HEADER);
            chunk.push('\n');
        }
        chunk.push_str(&record.to_string());
        chunk.push('\n');

        self.write_locked(&chunk)?;
        state.header_written = true;
        log::debug!("Appended level {} record to {}", record.level.code(), self.path.display());
        Ok(())
    }

    /// Append free-form text, serialized with record writes. The header
    /// still comes first if nothing has been written yet.
    pub fn append_raw(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| TrackerError::LockPoisoned)?;
        if state.header_written {
            return self.write_locked(text);
        }

        let mut chunk = String::with_capacity(LOG_HEADER.len() + 1 + text.len());
        chunk.push_str(LOG_HEADER);
        chunk.push('\n');
        chunk.push_str(text);
        self.write_locked(&chunk)?;
        state.header_written = true;
        Ok(())
    }

    fn write_locked(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TrackerError::io(&self.path, e))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| TrackerError::io(&self.path, e))
    }
}
