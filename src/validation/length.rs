/*!
 * Length validation for translated subtitles.
 *
 * This module checks translated lines against the display limits:
 * - Empty translation detection
 * - Newlines per translation
 * - Characters per displayed line
 */

use log::debug;

use crate::app_config::ParserConfig;
use crate::errors::ValidationError;
use crate::subtitles::SubtitleLine;

/// Types of length issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthIssue {
    /// Translation is empty
    EmptyTranslation,
    /// Translation has more newlines than allowed
    TooManyNewlines { count: usize, max: usize },
    /// A displayed line is longer than allowed
    LineTooLong { length: usize, max: usize },
}

impl std::fmt::Display for LengthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTranslation => write!(f, "Empty translation"),
            Self::TooManyNewlines { count, max } => {
                write!(f, "{} newlines (max {})", count, max)
            }
            Self::LineTooLong { length, max } => {
                write!(f, "Line of {} characters (max {})", length, max)
            }
        }
    }
}

/// Validator for translated line length
#[derive(Debug, Clone, Default)]
pub struct LengthValidator {
    config: ParserConfig,
}

impl LengthValidator {
    /// Create a new length validator
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Check a single translated line
    pub fn check_line(&self, line: &SubtitleLine) -> Vec<LengthIssue> {
        let text = line.text.trim();
        if text.is_empty() {
            return vec![LengthIssue::EmptyTranslation];
        }

        let mut issues = Vec::new();
        let newlines = text.matches('\n').count();
        if newlines > self.config.max_newlines {
            issues.push(LengthIssue::TooManyNewlines {
                count: newlines,
                max: self.config.max_newlines,
            });
        }

        let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        if longest > self.config.max_characters {
            issues.push(LengthIssue::LineTooLong {
                length: longest,
                max: self.config.max_characters,
            });
        }
        issues
    }

    /// Check translated lines, grouping the offending line numbers by fault
    pub fn validate_lines(&self, lines: &[SubtitleLine]) -> Vec<ValidationError> {
        let mut empty = Vec::new();
        let mut newlines = Vec::new();
        let mut too_long = Vec::new();

        for line in lines {
            for issue in self.check_line(line) {
                debug!("Line {}: {}", line.number, issue);
                match issue {
                    LengthIssue::EmptyTranslation => empty.push(line.number),
                    LengthIssue::TooManyNewlines { .. } => newlines.push(line.number),
                    LengthIssue::LineTooLong { .. } => too_long.push(line.number),
                }
            }
        }

        let mut errors = Vec::new();
        if !empty.is_empty() {
            errors.push(ValidationError::EmptyLines(empty));
        }
        if !newlines.is_empty() {
            errors.push(ValidationError::TooManyNewlines(newlines));
        }
        if !too_long.is_empty() {
            errors.push(ValidationError::LineTooLong(too_long));
        }
        errors
    }
}
