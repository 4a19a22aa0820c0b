//! Application configuration and CLI argument parsing.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use super::voices;
use crate::text::DEFAULT_MAX_CHARS;

/// Workers kept free for the runtime and the UI when sizing the pool.
const RESERVED_CORES: usize = 2;

/// Audio container requested from the speech provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum AudioFormat {
    /// AAC in ADTS framing (default, concatenates cleanly)
    #[default]
    Aac,
    /// MPEG layer III
    Mp3,
    /// Opus in Ogg
    Opus,
    /// Free lossless audio codec
    Flac,
    /// RIFF WAVE
    Wav,
    /// Raw 24kHz 16-bit little-endian samples
    Pcm,
}

impl AudioFormat {
    /// File extension and provider `response_format` value.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Aac => "aac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }

    /// Whether independently encoded segments can be joined byte-for-byte.
    ///
    /// Formats with a single global header (WAVE, FLAC, Ogg) produce a file
    /// whose header only describes the first segment.
    pub fn concatenates_cleanly(&self) -> bool {
        matches!(self, AudioFormat::Aac | AudioFormat::Mp3 | AudioFormat::Pcm)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Narration tool configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "narrate-md")]
#[command(author, version, about = "Convert Markdown notes into narrated audio files", long_about = None)]
pub struct AppConfig {
    /// Input directory containing Markdown files (runs non-interactively when set)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Output directory for audio files
    #[arg(long, short = 'o', default_value = "./audio_out")]
    pub output: PathBuf,

    /// TTS voice (alloy, ash, coral, echo, fable, onyx, nova, sage, shimmer, ...)
    #[arg(long, env = "OPENAI_TTS_VOICE", default_value = "alloy")]
    pub voice: String,

    /// Overwrite existing audio files
    #[arg(long)]
    pub overwrite: bool,

    /// List the provider's built-in voices and exit
    #[arg(long)]
    pub list_voices: bool,

    /// Speech model identifier
    #[arg(long, env = "OPENAI_TTS_MODEL", default_value = "tts-1-hd-1106")]
    pub model: String,

    /// Audio format of the generated files
    #[arg(long, value_enum, default_value = "aac")]
    pub format: AudioFormat,

    /// Speech speed multiplier (0.25 - 4.0)
    #[arg(long, default_value = "1.0", value_parser = parse_speed)]
    pub speed: f32,

    /// Voice direction passed to models that accept instructions
    #[arg(long, env = "OPENAI_TTS_INSTRUCTIONS", default_value = "Speak clearly for podcast listening.")]
    pub instructions: String,

    /// Provider API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// Provider API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    /// File name glob selecting which files to convert
    #[arg(long, default_value = "*.md")]
    pub pattern: String,

    /// Maximum characters per synthesis request
    #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
    pub max_chars: usize,

    /// Files converted in parallel (0 = auto-detect based on CPU cores)
    #[arg(long, default_value = "0")]
    pub concurrency: usize,

    /// Directory for the error log
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Immutable settings for one conversion run, shared by every worker.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub root: PathBuf,
    pub out: PathBuf,
    pub voice: String,
    pub model: String,
    pub format: AudioFormat,
    pub speed: f32,
    pub overwrite: bool,
    pub instructions: String,
    pub api_key: String,
    pub pattern: String,
    pub max_chars: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            out: PathBuf::from("./audio_out"),
            voice: "alloy".to_string(),
            model: "tts-1-hd-1106".to_string(),
            format: AudioFormat::default(),
            speed: 1.0,
            overwrite: false,
            instructions: String::new(),
            api_key: String::new(),
            pattern: "*.md".to_string(),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        let mut config = Self::parse();

        if config.list_voices {
            voices::print_voices();
            std::process::exit(0);
        }

        config.normalize_concurrency();
        config
    }

    /// Resolve `--concurrency 0` to available cores minus a reserve, never below one.
    fn normalize_concurrency(&mut self) {
        if self.concurrency == 0 {
            self.concurrency = default_concurrency(num_cpus::get());
        }
    }

    /// Whether the tool should run to completion without prompting.
    pub fn is_batch(&self) -> bool {
        self.input.is_some()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            anyhow::bail!("--max-chars must be positive");
        }

        if self.pattern.trim().is_empty() {
            anyhow::bail!("--pattern must not be empty");
        }

        check_voice(&self.voice);

        if !self.format.concatenates_cleanly() {
            warn!("{} output is joined from independent segments; players may only read the first one", self.format);
        }

        Ok(())
    }

    /// Build the settings for a run rooted at `root`.
    pub fn conversion(&self, root: &Path, out: &Path, voice: &str, overwrite: bool) -> ConversionConfig {
        ConversionConfig {
            root: root.to_path_buf(),
            out: out.to_path_buf(),
            voice: voice.to_string(),
            model: self.model.clone(),
            format: self.format,
            speed: self.speed,
            overwrite,
            instructions: self.instructions.clone(),
            api_key: self.api_key.trim().to_string(),
            pattern: self.pattern.clone(),
            max_chars: self.max_chars,
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        if let Some(ref input) = self.input {
            info!("  Input directory: {}", input.display());
        }
        info!("  Output directory: {}", self.output.display());
        info!("  Model: {}", self.model);
        info!("  Voice: {}", self.voice);
        info!("  Format: {}", self.format);
        info!("  Speed: {}", self.speed);
        info!("  Pattern: {}", self.pattern);
        info!("  Max chars per request: {}", self.max_chars);
        info!("  Concurrency: {}", self.concurrency);
        info!("  Overwrite: {}", self.overwrite);
        info!("  API key: {}", if self.api_key.trim().is_empty() { "missing" } else { "found" });
    }
}

/// Warn when `voice` is not a built-in voice. Returns whether it is known.
pub fn check_voice(voice: &str) -> bool {
    let known = voices::get_voice(voice).is_some();
    if !known {
        warn!("Voice '{}' is not a known built-in voice, the provider may reject it", voice);
    }
    known
}

/// Worker count for `cores` available cores.
pub fn default_concurrency(cores: usize) -> usize {
    cores.saturating_sub(RESERVED_CORES).max(1)
}

/// Parse and validate the speed multiplier (0.25-4.0).
fn parse_speed(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if (0.25..=4.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("speed must be between 0.25 and 4.0, got {}", value))
    }
}
