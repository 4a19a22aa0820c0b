//! Prompt-driven front end used when no `--input` is given.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ConsoleReporter, ErrorLog, drive_run};
use crate::config::{AppConfig, check_voice};
use crate::convert::Orchestrator;

/// Line-based prompts over stdin that give up when the session is cancelled.
struct Prompter {
    lines: Lines<BufReader<Stdin>>,
    cancel: CancellationToken,
}

impl Prompter {
    fn new(cancel: CancellationToken) -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines(), cancel }
    }

    /// Ask for a value; `None` on end of input or cancellation.
    async fn ask(&mut self, label: &str, default: &str) -> Result<Option<String>> {
        print!("{} [{}]: ", label, default);
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(None),
            line = self.lines.next_line() => line?,
        };
        Ok(line.map(|l| with_default(&l, default)))
    }

    async fn confirm(&mut self, label: &str, default: bool) -> Result<Option<bool>> {
        let hint = if default { "Y/n" } else { "y/N" };
        Ok(self.ask(label, hint).await?.map(|answer| parse_yes_no(&answer, default)))
    }
}

fn with_default(answer: &str, default: &str) -> String {
    let answer = answer.trim();
    if answer.is_empty() { default.to_string() } else { answer.to_string() }
}

fn parse_yes_no(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// Collect run parameters from the user, run, and offer to go again.
///
/// # Errors
/// Returns an error if stdin or the error log cannot be used.
pub async fn run_interactive(app: &AppConfig, orchestrator: &Orchestrator, cancel: CancellationToken) -> Result<()> {
    let errlog = ErrorLog::open(&app.log_dir)?;
    let mut prompter = Prompter::new(cancel.clone());

    println!("narrate-md v{}", env!("CARGO_PKG_VERSION"));
    if app.api_key.trim().is_empty() {
        println!("✗ OPENAI_API_KEY missing, runs will not start");
    } else {
        println!("✓ OPENAI_API_KEY found");
    }

    loop {
        let Some(input) = prompter.ask("Input directory", ".").await? else { break };
        let Some(output) = prompter.ask("Output directory", &app.output.display().to_string()).await? else { break };
        let Some(voice) = prompter.ask("Voice", &app.voice).await? else { break };
        check_voice(&voice);
        let Some(overwrite) = prompter.confirm("Overwrite existing files?", app.overwrite).await? else { break };

        let config = app.conversion(&PathBuf::from(input), &PathBuf::from(&output), &voice, overwrite);
        let mut reporter = ConsoleReporter::default();
        match drive_run(orchestrator, config, cancel.child_token(), &mut reporter, Some(&errlog)).await {
            Ok(summary) => {
                println!("Audio written to {}", output);
                if summary.failed > 0 {
                    println!("Failures recorded in {}", errlog.path().display());
                }
            }
            Err(e) => println!("✗ {}", e),
        }

        if cancel.is_cancelled() {
            break;
        }
        match prompter.confirm("Run again?", false).await? {
            Some(true) => continue,
            _ => break,
        }
    }

    debug!("Interactive session finished");
    Ok(())
}
