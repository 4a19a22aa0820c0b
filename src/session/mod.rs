//! Front ends that drive conversion runs.
//!
//! Both the batch and the interactive front end consume the orchestrator's
//! event stream; neither depends on how the run is scheduled.

mod errlog;
mod interactive;
mod report;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use errlog::ErrorLog;
pub use interactive::run_interactive;
pub use report::{ConsoleReporter, LogReporter, Reporter};

use crate::config::{AppConfig, ConversionConfig};
use crate::convert::{Orchestrator, PrepareError, RunEvent, RunState, RunSummary};

/// Events buffered between the run and its observer.
const EVENT_BUFFER: usize = 100;

/// Run one conversion, feeding every event to `reporter` and failures to `errlog`.
///
/// # Errors
/// Returns the preparation error when the run could not start.
pub async fn drive_run(
    orchestrator: &Orchestrator,
    config: ConversionConfig,
    cancel: CancellationToken,
    reporter: &mut dyn Reporter,
    errlog: Option<&ErrorLog>,
) -> Result<RunSummary, PrepareError> {
    let root = config.root.clone();
    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);

    let run = orchestrator.execute(config, tx, cancel);
    let observe = async {
        while let Some(event) = rx.recv().await {
            if let Some(log) = errlog {
                match &event {
                    RunEvent::State(RunState::Running) => log.begin_run(&root),
                    RunEvent::Finished { job, result } => {
                        if let Some(ref e) = result.error {
                            log.record(job, e);
                        }
                    }
                    RunEvent::Completed(summary) => log.end_run(summary),
                    _ => {}
                }
            }
            reporter.on_event(&event);
        }
    };

    let (result, ()) = tokio::join!(run, observe);
    result
}

/// Convert `--input` to completion without prompting.
///
/// # Errors
/// Fails when the run cannot start or when any file failed to convert.
pub async fn run_batch(app: &AppConfig, orchestrator: &Orchestrator, cancel: CancellationToken) -> Result<()> {
    let Some(ref input) = app.input else {
        anyhow::bail!("--input is required for batch mode");
    };

    let errlog = ErrorLog::open(&app.log_dir)?;
    let config = app.conversion(input, &app.output, &app.voice, app.overwrite);
    let mut reporter = LogReporter::default();

    let summary = drive_run(orchestrator, config, cancel, &mut reporter, Some(&errlog)).await?;
    info!("✅ {} · output in {}", summary, app.output.display());

    if summary.failed > 0 {
        anyhow::bail!("{} file(s) failed, see {}", summary.failed, errlog.path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::tts::{MockClient, SynthesisError};

    #[derive(Default)]
    struct Recorder {
        states: Vec<RunState>,
        finished: usize,
    }

    impl Reporter for Recorder {
        fn on_event(&mut self, event: &RunEvent) {
            match event {
                RunEvent::State(state) => self.states.push(*state),
                RunEvent::Finished { .. } => self.finished += 1,
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_drive_run_logs_failures() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("notes");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.md"), "Alpha.").unwrap();

        let config = ConversionConfig { root: root.clone(), out: dir.path().join("out"), api_key: "sk-test".to_string(), ..Default::default() };
        let client = Arc::new(MockClient::failing_on(1, SynthesisError::from_status(401, "Unauthorized", "bad key")));
        let orchestrator = Orchestrator::new(client, 1);
        let errlog = ErrorLog::open(&dir.path().join("logs")).unwrap();
        let mut recorder = Recorder::default();

        let summary = drive_run(&orchestrator, config, CancellationToken::new(), &mut recorder, Some(&errlog)).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(recorder.finished, 1);
        assert_eq!(recorder.states, vec![RunState::Preparing, RunState::Running, RunState::Completed]);
        let log = fs::read_to_string(errlog.path()).unwrap();
        assert!(log.contains("ERROR a.md: chunk 1: 401 Unauthorized: bad key"));
    }

    #[tokio::test]
    async fn test_drive_run_reports_preparation_failure() {
        let dir = TempDir::new().unwrap();
        let config = ConversionConfig { root: dir.path().to_path_buf(), ..Default::default() };
        let orchestrator = Orchestrator::new(Arc::new(MockClient::default()), 1);
        let mut recorder = Recorder::default();

        let result = drive_run(&orchestrator, config, CancellationToken::new(), &mut recorder, None).await;

        assert!(matches!(result, Err(PrepareError::MissingCredential)));
        assert_eq!(recorder.states, vec![RunState::Preparing, RunState::Failed]);
    }
}
