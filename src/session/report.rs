//! Rendering of run events for the batch and interactive front ends.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::convert::{JobOutcome, JobResult, RunEvent, RunState};

/// Width of the per-file progress bar, in cells.
const BAR_WIDTH: usize = 24;

/// Consumes run events as they arrive.
pub trait Reporter: Send {
    fn on_event(&mut self, event: &RunEvent);
}

/// Batch mode: one log line per milestone.
#[derive(Default)]
pub struct LogReporter {
    total: usize,
    finished: usize,
}

impl Reporter for LogReporter {
    fn on_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Started { total } => self.total = *total,
            RunEvent::Progress(p) => debug!("🔊 {} chunk {}/{}", p.job.display(), p.current, p.total),
            RunEvent::Finished { job, result } => {
                self.finished += 1;
                let status = status_label(result);
                if result.outcome == JobOutcome::Failed {
                    warn!("[{}/{}] {} {}", self.finished, self.total, job.name(), status);
                } else {
                    info!("[{}/{}] {} {}", self.finished, self.total, job.name(), status);
                }
            }
            RunEvent::State(RunState::Failed) => warn!("Run could not start"),
            RunEvent::Completed(summary) => debug!("Processed {} of {} file(s)", summary.total(), self.total),
            RunEvent::State(_) => {}
        }
    }
}

/// Interactive mode: progress bars and status lines on stdout.
#[derive(Default)]
pub struct ConsoleReporter {
    total: usize,
    finished: usize,
    tasks: BTreeMap<PathBuf, (usize, usize)>,
}

impl Reporter for ConsoleReporter {
    fn on_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::State(RunState::Preparing) => println!("Preparing files…"),
            RunEvent::Started { total } => {
                self.total = *total;
                println!("Synthesizing {} file(s) · ctrl+c to abort", total);
            }
            RunEvent::Progress(p) => {
                self.tasks.insert(p.job.clone(), (p.current, p.total));
                println!("  {} {}", progress_bar(p.current, p.total, BAR_WIDTH), p.job.display());
            }
            RunEvent::Finished { job, result } => {
                self.finished += 1;
                let (_, total) = self.tasks.remove(&job.rel_path).unwrap_or((0, result.chunks));
                let done = if result.outcome == JobOutcome::Done { total } else { result.chunks };
                println!("{} {} {} ({}/{} files)", progress_bar(done, total, BAR_WIDTH), job.name(), status_label(result), self.finished, self.total);
            }
            RunEvent::Completed(summary) => println!("\nAll done! {}", summary),
            RunEvent::State(_) => {}
        }
    }
}

fn status_label(result: &JobResult) -> String {
    match (&result.outcome, &result.error) {
        (JobOutcome::Done, _) => format!("done ({} chunks)", result.chunks),
        (JobOutcome::Failed, Some(e)) if e.is_cancelled() => "cancelled".to_string(),
        (JobOutcome::Failed, Some(e)) => format!("error: {}", e),
        (outcome, _) => outcome.to_string(),
    }
}

/// Text progress bar such as `[██████░░░░░░ 2/4]`.
pub fn progress_bar(current: usize, total: usize, width: usize) -> String {
    let width = width.max(4);
    let ratio = if total == 0 { 0.0 } else { (current as f64 / total as f64).clamp(0.0, 1.0) };
    let filled = ((ratio * width as f64) as usize).min(width);
    format!("[{}{} {}/{}]", "█".repeat(filled), "░".repeat(width - filled), current, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::JobError;

    #[test]
    fn test_progress_bar_fill() {
        assert_eq!(progress_bar(0, 4, 4), "[░░░░ 0/4]");
        assert_eq!(progress_bar(2, 4, 8), "[████░░░░ 2/4]");
        assert_eq!(progress_bar(9, 4, 4), "[████ 9/4]");
        assert_eq!(progress_bar(0, 0, 1), "[░░░░ 0/0]");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(&JobResult::done(3)), "done (3 chunks)");
        assert_eq!(status_label(&JobResult::skipped()), "skipped");
        assert_eq!(status_label(&JobResult::failed(0, JobError::Cancelled)), "cancelled");
    }
}
