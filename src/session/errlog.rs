//! Append-only log of job failures, kept for diagnosis after a run.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::convert::{FileJob, JobError, RunSummary};

const LOG_FILE_NAME: &str = "narrate-md-errors.log";

/// Error log shared by everything that reports on a run.
pub struct ErrorLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ErrorLog {
    /// Open (or create) the log inside `dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be created.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path).with_context(|| format!("Failed to open log file {}", path.display()))?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin_run(&self, root: &Path) {
        self.write(&format!("\n=== run {} ({}) ===\n", timestamp(), root.display()));
    }

    pub fn record(&self, job: &FileJob, error: &JobError) {
        self.write(&format!("ERROR {}: {}\n", job.name(), error));
    }

    pub fn end_run(&self, summary: &RunSummary) {
        self.write(&format!("=== run finished {} ({}) ===\n", timestamp(), summary));
    }

    fn write(&self, line: &str) {
        let mut file = self.file.lock();
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            warn!("Failed to write error log {}: {}", self.path.display(), e);
        }
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string())
}
