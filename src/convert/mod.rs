//! Conversion pipeline: job discovery, per-file processing and run orchestration.

mod discover;
mod orchestrator;
mod processor;
mod types;

pub use orchestrator::{Orchestrator, PrepareError};
pub use types::{FileJob, JobError, JobOutcome, JobResult, ProgressEvent, RunEvent, RunState, RunSummary};
