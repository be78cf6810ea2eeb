use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use crate::errors::ConfigError;

/// Application configuration module
/// This module handles the configuration of each core component:
/// batching thresholds, parser limits, queue workers and translation settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Batcher thresholds
    #[serde(default)]
    pub batcher: BatcherConfig,

    /// Translation parser limits
    #[serde(default)]
    pub parser: ParserConfig,

    /// Command queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Translation request settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Thresholds used to partition lines into scenes and batches
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatcherConfig {
    /// Gap in milliseconds that starts a new scene
    #[serde(default = "default_scene_threshold_ms")]
    pub scene_threshold_ms: u64,

    /// Minimum number of lines in a batch produced by splitting
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    /// Batches larger than this are split
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            scene_threshold_ms: default_scene_threshold_ms(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl BatcherConfig {
    /// Validate thresholds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scene_threshold_ms == 0 {
            return Err(invalid("scene_threshold_ms", "must be greater than zero"));
        }
        if self.min_batch_size == 0 {
            return Err(invalid("min_batch_size", "must be at least 1"));
        }
        // A batch above max_batch_size must leave room for two halves of min_batch_size
        if self.max_batch_size < self.min_batch_size * 2 {
            return Err(invalid(
                "max_batch_size",
                &format!("must be at least twice min_batch_size ({})", self.min_batch_size),
            ));
        }
        Ok(())
    }
}

/// Limits applied when validating parsed translations
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ParserConfig {
    /// Maximum characters in any single line of a translation
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,

    /// Maximum newlines in a translation
    #[serde(default = "default_max_newlines")]
    pub max_newlines: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_characters: default_max_characters(),
            max_newlines: default_max_newlines(),
        }
    }
}

impl ParserConfig {
    /// Validate limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_characters == 0 {
            return Err(invalid("max_characters", "must be at least 1"));
        }
        if self.max_newlines == 0 {
            return Err(invalid("max_newlines", "must be at least 1"));
        }
        Ok(())
    }
}

/// Command queue settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueueConfig {
    /// Maximum non-blocking commands running at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// How long `stop` waits for the worker before aborting running commands
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl QueueConfig {
    /// Validate worker settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(invalid("max_workers", "must be at least 1"));
        }
        Ok(())
    }

    /// Stop timeout as a duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Settings used to build translation prompts
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Source language name
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language name
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Instructions template
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Maximum number of previous batch summaries sent as context
    #[serde(default = "default_max_context_summaries")]
    pub max_context_summaries: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_language: default_target_language(),
            instructions: default_instructions(),
            max_context_summaries: default_max_context_summaries(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn default_scene_threshold_ms() -> u64 {
    30_000
}

fn default_min_batch_size() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    30
}

fn default_max_characters() -> usize {
    99
}

fn default_max_newlines() -> usize {
    2
}

fn default_max_workers() -> usize {
    4
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

fn default_source_language() -> String {
    "English".to_string()
}

fn default_target_language() -> String {
    "French".to_string()
}

fn default_max_context_summaries() -> usize {
    10
}

fn default_instructions() -> String {
    "You are a professional subtitle translator. Translate each numbered line from {source_language} to {target_language}. Keep the numbering, reply in the same format, and do not merge or split lines. After the lines, summarise the batch in <summary></summary> tags and the scene so far in <scene></scene> tags.".to_string()
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.batcher.validate()?;
        self.parser.validate()?;
        self.queue.validate()?;
        Ok(())
    }
}
