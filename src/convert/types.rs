//! Jobs, outcomes and run events.

use std::fmt;
use std::path::PathBuf;

use crate::tts::SynthesisError;

/// One source document and where its audio goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub abs_path: PathBuf,
    /// Path relative to the input root; display key for the job
    pub rel_path: PathBuf,
    pub dest_path: PathBuf,
}

impl FileJob {
    /// Display name used in progress and logs.
    pub fn name(&self) -> String {
        self.rel_path.display().to_string()
    }
}

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    /// Destination already exists and overwrite is off
    Skipped,
    /// Nothing left to speak after normalization
    Empty,
    Failed,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Done => write!(f, "done"),
            JobOutcome::Skipped => write!(f, "skipped"),
            JobOutcome::Empty => write!(f, "empty"),
            JobOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job failed.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {chunk}: {source}")]
    Synthesis {
        chunk: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("cancelled")]
    Cancelled,
}

impl JobError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Io { action, path: path.into(), source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

/// Result of processing one job.
#[derive(Debug)]
pub struct JobResult {
    pub outcome: JobOutcome,
    /// Chunks synthesized (0 for skipped and empty jobs)
    pub chunks: usize,
    pub error: Option<JobError>,
}

impl JobResult {
    pub fn done(chunks: usize) -> Self {
        Self { outcome: JobOutcome::Done, chunks, error: None }
    }

    pub fn skipped() -> Self {
        Self { outcome: JobOutcome::Skipped, chunks: 0, error: None }
    }

    pub fn empty() -> Self {
        Self { outcome: JobOutcome::Empty, chunks: 0, error: None }
    }

    pub fn failed(chunks: usize, error: JobError) -> Self {
        Self { outcome: JobOutcome::Failed, chunks, error: Some(error) }
    }
}

/// Live chunk progress for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub job: PathBuf,
    /// 1-based index of the chunk being synthesized
    pub current: usize,
    pub total: usize,
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Done => self.done += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Empty => self.empty += 1,
            JobOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.done + self.skipped + self.empty + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "written {} · skipped {} · empty {} · failed {}", self.done, self.skipped, self.empty, self.failed)
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Preparing,
    Running,
    Completed,
    Failed,
}

/// Messages emitted by a run, in the order they happen.
#[derive(Debug)]
pub enum RunEvent {
    State(RunState),
    Started { total: usize },
    Progress(ProgressEvent),
    Finished { job: FileJob, result: JobResult },
    Completed(RunSummary),
}
