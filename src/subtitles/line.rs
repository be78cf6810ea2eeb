/*!
 * A single timed subtitle line.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// One timed subtitle entry.
///
/// A translated line is a separate `SubtitleLine` carrying the same `number`
/// as the source line it translates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleLine {
    /// Line number, unique and strictly increasing across the document
    pub number: usize,

    /// Start time in milliseconds
    pub start_ms: u64,

    /// End time in milliseconds
    pub end_ms: u64,

    /// Line text
    pub text: String,

    /// Translation attached to a source line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl SubtitleLine {
    /// Create a new line without a translation
    pub fn new(number: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            number,
            start_ms,
            end_ms,
            text: text.into(),
            translation: None,
        }
    }

    /// Set the translation
    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Create the translated counterpart of this line
    pub fn translated(&self, text: impl Into<String>) -> Self {
        Self {
            number: self.number,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            text: text.into(),
            translation: None,
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Gap between the end of `previous` and the start of this line
    pub fn gap_after(&self, previous: &SubtitleLine) -> u64 {
        self.start_ms.saturating_sub(previous.end_ms)
    }

    /// Format milliseconds as HH:MM:SS,mmm
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;
        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} --> {}] {}",
            self.number,
            Self::format_timestamp(self.start_ms),
            Self::format_timestamp(self.end_ms),
            self.text
        )
    }
}
