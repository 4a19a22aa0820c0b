//! Bounded-concurrency execution of a whole run.
//!
//! Workers never touch shared state: they report progress and results over a
//! channel, and the single aggregating loop owns the [`RunSummary`].

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::discover::{DiscoverError, discover};
use super::processor::FileProcessor;
use super::{FileJob, JobError, JobResult, ProgressEvent, RunEvent, RunState, RunSummary};
use crate::config::ConversionConfig;
use crate::tts::SynthesisClient;

/// Errors that abort a run before any job starts.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("OPENAI_API_KEY is not set")]
    MissingCredential,

    #[error("input directory not found: {}", .0.display())]
    InputNotFound(std::path::PathBuf),

    #[error("no files matching {pattern}")]
    NoMatchingFiles { pattern: String },

    #[error(transparent)]
    Discovery(#[from] DiscoverError),

    #[error("preparation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Worker to aggregator messages.
enum WorkerEvent {
    Progress(ProgressEvent),
    Finished { index: usize, result: JobResult },
}

/// Validate the configuration and list the jobs for a run.
///
/// # Errors
/// Fails on a missing credential, a missing input directory, a traversal
/// error, or when no file matches the pattern.
pub fn prepare(config: &ConversionConfig) -> Result<Vec<FileJob>, PrepareError> {
    if config.api_key.is_empty() {
        return Err(PrepareError::MissingCredential);
    }
    if !config.root.is_dir() {
        return Err(PrepareError::InputNotFound(config.root.clone()));
    }

    let jobs = discover(&config.root, &config.out, &config.pattern, config.format.extension())?;
    if jobs.is_empty() {
        return Err(PrepareError::NoMatchingFiles { pattern: config.pattern.clone() });
    }

    info!("Found {} file(s) matching {} under {}", jobs.len(), config.pattern, config.root.display());
    Ok(jobs)
}

/// Drives runs: preparation, fan-out to workers, and result aggregation.
pub struct Orchestrator {
    client: Arc<dyn SynthesisClient>,
    concurrency: usize,
}

impl Orchestrator {
    /// `concurrency` is clamped to at least one worker.
    pub fn new(client: Arc<dyn SynthesisClient>, concurrency: usize) -> Self {
        Self { client, concurrency: concurrency.max(1) }
    }

    /// Prepare and run a conversion, streaming [`RunEvent`]s to `events`.
    ///
    /// The state goes `Preparing` then either `Failed` (preparation error,
    /// returned as `Err`) or `Running` then `Completed`. Job failures never
    /// abort the run; they are counted in the returned summary.
    pub async fn execute(&self, config: ConversionConfig, events: mpsc::Sender<RunEvent>, cancel: CancellationToken) -> Result<RunSummary, PrepareError> {
        emit(&events, RunEvent::State(RunState::Preparing)).await;

        // Directory traversal is blocking I/O.
        let prepared = {
            let config = config.clone();
            tokio::task::spawn_blocking(move || prepare(&config)).await.map_err(PrepareError::from).and_then(std::convert::identity)
        };
        let jobs = match prepared {
            Ok(jobs) => jobs,
            Err(e) => {
                emit(&events, RunEvent::State(RunState::Failed)).await;
                return Err(e);
            }
        };

        Ok(self.run(Arc::new(config), jobs, &events, cancel).await)
    }

    /// Process every job with at most `concurrency` in flight.
    pub async fn run(&self, config: Arc<ConversionConfig>, jobs: Vec<FileJob>, events: &mpsc::Sender<RunEvent>, cancel: CancellationToken) -> RunSummary {
        emit(events, RunEvent::State(RunState::Running)).await;
        emit(events, RunEvent::Started { total: jobs.len() }).await;
        info!("Converting {} file(s) with {} worker(s)", jobs.len(), self.concurrency);

        let processor = Arc::new(FileProcessor::new(self.client.clone(), config));
        let slots = Arc::new(Semaphore::new(self.concurrency));
        let (worker_tx, mut worker_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for (index, job) in jobs.iter().cloned().enumerate() {
            let processor = processor.clone();
            let slots = slots.clone();
            let tx = worker_tx.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let permit = tokio::select! {
                    permit = slots.acquire_owned() => permit.ok(),
                    _ = cancel.cancelled() => None,
                };

                let report = |current: usize, total: usize| {
                    let _ = tx.send(WorkerEvent::Progress(ProgressEvent { job: job.rel_path.clone(), current, total }));
                };
                let result = processor.process(&job, &cancel, Some(&report)).await;

                // Free the slot before reporting so the next job can start.
                drop(permit);
                let _ = tx.send(WorkerEvent::Finished { index, result });
            });
        }
        drop(worker_tx);

        let mut summary = RunSummary::default();
        let mut reported = vec![false; jobs.len()];
        while let Some(event) = worker_rx.recv().await {
            match event {
                WorkerEvent::Progress(progress) => emit(events, RunEvent::Progress(progress)).await,
                WorkerEvent::Finished { index, result } => {
                    reported[index] = true;
                    let job = jobs[index].clone();
                    log_result(&job, &result);
                    summary.record(result.outcome);
                    emit(events, RunEvent::Finished { job, result }).await;
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }

        // A worker that panicked never reported; count its job as failed.
        for (index, job) in jobs.iter().enumerate() {
            if !reported[index] {
                let result = JobResult::failed(0, JobError::io("process", &job.abs_path, std::io::Error::other("worker task panicked")));
                log_result(job, &result);
                summary.record(result.outcome);
                emit(events, RunEvent::Finished { job: job.clone(), result }).await;
            }
        }

        info!("Run complete: {}", summary);
        emit(events, RunEvent::State(RunState::Completed)).await;
        emit(events, RunEvent::Completed(summary)).await;
        summary
    }
}

fn log_result(job: &FileJob, result: &JobResult) {
    match &result.error {
        Some(e) if e.is_cancelled() => warn!(job = %job.name(), "Cancelled"),
        Some(e) => error!(job = %job.name(), chunks = result.chunks, "Failed: {}", e),
        None => debug!(job = %job.name(), chunks = result.chunks, "{}", result.outcome),
    }
}

/// Forward an event to the observer; a departed observer does not stop the run.
async fn emit(events: &mpsc::Sender<RunEvent>, event: RunEvent) {
    if events.send(event).await.is_err() {
        debug!("Run observer closed");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::convert::JobOutcome;
    use crate::tts::{MockClient, SynthesisError};

    /// Slow client that records the highest number of overlapping calls.
    #[derive(Default)]
    struct OverlapClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SynthesisClient for OverlapClient {
        async fn synthesize(&self, _config: &ConversionConfig, _text: &str) -> Result<Vec<u8>, SynthesisError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(b"AUDIO".to_vec())
        }
    }

    fn config_for(root: &Path, overwrite: bool) -> ConversionConfig {
        ConversionConfig {
            root: root.to_path_buf(),
            out: root.join("out"),
            api_key: "sk-test".to_string(),
            overwrite,
            ..Default::default()
        }
    }

    async fn collect(mut rx: mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped_without_network() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("note.md"), "Hello there.").unwrap();
        fs::create_dir_all(root.path().join("out")).unwrap();
        fs::write(root.path().join("out").join("note.aac"), "existing").unwrap();

        let client = Arc::new(MockClient::default());
        let orchestrator = Orchestrator::new(client.clone(), 2);
        let (tx, rx) = mpsc::channel(64);
        let summary = orchestrator.execute(config_for(root.path(), false), tx, CancellationToken::new()).await.unwrap();

        assert_eq!(summary, RunSummary { skipped: 1, ..Default::default() });
        assert_eq!(client.calls(), 0);

        let events = collect(rx).await;
        assert!(matches!(events.first(), Some(RunEvent::State(RunState::Preparing))));
        assert!(matches!(events.last(), Some(RunEvent::Completed(s)) if s.skipped == 1));
    }

    #[tokio::test]
    async fn test_run_converts_every_file() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("a").join("b")).unwrap();
        fs::write(root.path().join("one.md"), "First file.").unwrap();
        fs::write(root.path().join("a").join("two.md"), "Second file.").unwrap();
        fs::write(root.path().join("a").join("b").join("three.md"), "```\ncode\n```").unwrap();
        fs::write(root.path().join("a").join("skip.txt"), "Not markdown.").unwrap();

        let client = Arc::new(MockClient::echo());
        let (tx, rx) = mpsc::channel(64);
        let summary = Orchestrator::new(client.clone(), 1).execute(config_for(root.path(), false), tx, CancellationToken::new()).await.unwrap();

        assert_eq!(summary, RunSummary { done: 2, empty: 1, ..Default::default() });
        assert_eq!(client.calls(), 2);
        assert_eq!(fs::read(root.path().join("out").join("one.aac")).unwrap(), b"First file.");
        assert_eq!(fs::read(root.path().join("out").join("a").join("two.aac")).unwrap(), b"Second file.");

        let events = collect(rx).await;
        let finished = events.iter().filter(|e| matches!(e, RunEvent::Finished { .. })).count();
        let progress = events.iter().filter(|e| matches!(e, RunEvent::Progress(_))).count();
        assert_eq!(finished, 3);
        assert_eq!(progress, 2);
        assert!(events.iter().any(|e| matches!(e, RunEvent::Started { total: 3 })));
    }

    #[tokio::test]
    async fn test_job_failure_does_not_abort_run() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.md"), "Alpha.").unwrap();
        fs::write(root.path().join("b.md"), "Beta.").unwrap();

        let client = Arc::new(MockClient::failing_on(1, SynthesisError::from_status(400, "Bad Request", "")));
        let (tx, rx) = mpsc::channel(64);
        let summary = Orchestrator::new(client.clone(), 1).execute(config_for(root.path(), true), tx, CancellationToken::new()).await.unwrap();

        assert_eq!(summary, RunSummary { done: 1, failed: 1, ..Default::default() });
        drop(collect(rx).await);
    }

    #[tokio::test]
    async fn test_cancelled_run_fails_every_job() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.md"), "Alpha.").unwrap();
        fs::write(root.path().join("b.md"), "Beta.").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = Arc::new(MockClient::default());
        let (tx, rx) = mpsc::channel(64);
        let summary = Orchestrator::new(client.clone(), 2).execute(config_for(root.path(), true), tx, cancel).await.unwrap();

        assert_eq!(summary, RunSummary { failed: 2, ..Default::default() });
        assert_eq!(client.calls(), 0);

        let events = collect(rx).await;
        let all_cancelled = events.iter().filter_map(|e| match e {
            RunEvent::Finished { result, .. } => result.error.as_ref(),
            _ => None,
        });
        assert!(all_cancelled.into_iter().all(|e| e.is_cancelled()));
    }

    #[tokio::test]
    async fn test_preparation_errors() {
        let root = TempDir::new().unwrap();
        let client: Arc<dyn SynthesisClient> = Arc::new(MockClient::default());
        let orchestrator = Orchestrator::new(client, 1);

        let mut no_key = config_for(root.path(), false);
        no_key.api_key.clear();
        let (tx, rx) = mpsc::channel(8);
        assert!(matches!(orchestrator.execute(no_key, tx, CancellationToken::new()).await, Err(PrepareError::MissingCredential)));
        let events = collect(rx).await;
        assert!(matches!(events.as_slice(), [RunEvent::State(RunState::Preparing), RunEvent::State(RunState::Failed)]));

        let missing = config_for(&root.path().join("missing"), false);
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(orchestrator.execute(missing, tx, CancellationToken::new()).await, Err(PrepareError::InputNotFound(_))));

        fs::write(root.path().join("readme.txt"), "text").unwrap();
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            orchestrator.execute(config_for(root.path(), false), tx, CancellationToken::new()).await,
            Err(PrepareError::NoMatchingFiles { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrency_limit_bounds_in_flight_calls() {
        let root = TempDir::new().unwrap();
        for i in 0..12 {
            fs::write(root.path().join(format!("doc{:02}.md", i)), "Some text.").unwrap();
        }

        let client = Arc::new(OverlapClient::default());
        let (tx, rx) = mpsc::channel(256);
        let summary = Orchestrator::new(client.clone(), 3).execute(config_for(root.path(), false), tx, CancellationToken::new()).await.unwrap();
        drop(collect(rx).await);

        assert_eq!(summary, RunSummary { done: 12, ..Default::default() });
        let peak = client.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight calls {} exceeded the limit", peak);
        assert!(peak >= 2, "jobs never overlapped (peak {})", peak);
    }

    #[test]
    fn test_job_outcome_order_is_irrelevant_to_summary() {
        let mut a = RunSummary::default();
        let mut b = RunSummary::default();
        for o in [JobOutcome::Failed, JobOutcome::Done, JobOutcome::Skipped] {
            a.record(o);
        }
        for o in [JobOutcome::Skipped, JobOutcome::Failed, JobOutcome::Done] {
            b.record(o);
        }
        assert_eq!(a, b);
    }
}
