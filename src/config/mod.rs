//! Configuration module for CLI arguments and conversion settings.

#[allow(clippy::module_inception)]
mod config;
mod voices;

pub use config::{AppConfig, AudioFormat, ConversionConfig, check_voice};
