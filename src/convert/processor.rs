//! Conversion of a single document into one audio file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{FileJob, JobError, JobResult};
use crate::config::ConversionConfig;
use crate::text;
use crate::tts::SynthesisClient;

/// Progress callback: `(current_chunk, total_chunks)`, current is 1-based.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Runs the read → normalize → chunk → synthesize → write sequence for a job.
pub struct FileProcessor {
    client: Arc<dyn SynthesisClient>,
    config: Arc<ConversionConfig>,
}

impl FileProcessor {
    pub fn new(client: Arc<dyn SynthesisClient>, config: Arc<ConversionConfig>) -> Self {
        Self { client, config }
    }

    /// Convert one job, returning exactly one result.
    ///
    /// Never leaves a partial destination file behind: audio is written to a
    /// sibling temporary file and renamed into place once complete.
    pub async fn process(&self, job: &FileJob, cancel: &CancellationToken, progress: Option<&ProgressFn<'_>>) -> JobResult {
        if cancel.is_cancelled() {
            return JobResult::failed(0, JobError::Cancelled);
        }

        if !self.config.overwrite {
            match fs::try_exists(&job.dest_path).await {
                Ok(true) => {
                    debug!("Skipping {}, destination exists", job.name());
                    return JobResult::skipped();
                }
                Ok(false) => {}
                Err(e) => return JobResult::failed(0, JobError::io("check", &job.dest_path, e)),
            }
        }

        // Documents in legacy encodings are narrated with replacement characters
        let markdown = match fs::read(&job.abs_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => return JobResult::failed(0, JobError::io("read", &job.abs_path, e)),
        };

        let plain = text::normalize(&markdown);
        if plain.trim().is_empty() {
            return JobResult::empty();
        }

        let chunks = text::chunk_text(&plain, self.config.max_chars);
        if chunks.is_empty() {
            return JobResult::empty();
        }

        if let Some(parent) = job.dest_path.parent()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            return JobResult::failed(0, JobError::io("create directory", parent, e));
        }

        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                return JobResult::failed(idx, JobError::Cancelled);
            }
            if let Some(report) = progress {
                report(idx + 1, total);
            }

            debug!(job = %job.name(), chunk = idx + 1, total, "Synthesizing chunk ({} chars)", chunk.len());
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return JobResult::failed(idx, JobError::Cancelled),
                result = self.client.synthesize(&self.config, chunk) => result,
            };

            match result {
                Ok(bytes) => audio.extend_from_slice(&bytes),
                Err(source) => return JobResult::failed(idx, JobError::Synthesis { chunk: idx + 1, source }),
            }
        }

        if let Err(e) = write_atomic(&job.dest_path, &audio).await {
            return JobResult::failed(total, JobError::io("write", &job.dest_path, e));
        }

        info!(job = %job.name(), chunks = total, bytes = audio.len(), "Wrote {}", job.dest_path.display());
        JobResult::done(total)
    }
}

/// Write `data` to a temporary sibling of `dest`, then rename it over `dest`.
async fn write_atomic(dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = partial_path(dest);
    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, dest).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    dest.with_file_name(format!(".{}.partial", name))
}
