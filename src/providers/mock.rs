/*!
 * Mock backend implementations for testing.
 *
 * This module provides a mock backend that simulates different behaviors:
 * - `MockBackend::working()` - Always replies with every line translated
 * - `MockBackend::partial()` - Omits every other line
 * - `MockBackend::swapped()` - Replies with original and translation swapped
 * - `MockBackend::failing()` - Always fails with an error
 * - `MockBackend::empty()` - Replies with nothing parseable
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::TranslationBackend;
use crate::subtitles::SubtitleLine;
use crate::translation::formatting::format_entry;
use crate::translation::TranslationPrompt;

/// Prefix added to every translated line by the working mock
pub const TRANSLATED_PREFIX: &str = "[TRANSLATED] ";

/// Added to the number of every second entry by the drifted mock
pub const DRIFT_OFFSET: usize = 1000;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Succeeds but leaves out every second line
    Partial,
    /// Succeeds with original and translation in each other's place
    Swapped,
    /// Succeeds but numbers every second entry out of range
    Drifted,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns a response without any numbered entry
    Empty,
    /// Simulates slow response (for abort and concurrency testing)
    Slow { delay_ms: u64 },
}

/// Mock backend for testing translation behavior
#[derive(Debug)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&TranslationPrompt) -> String>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that omits every second line
    pub fn partial() -> Self {
        Self::new(MockBehavior::Partial)
    }

    /// Create a mock that swaps original and translation
    pub fn swapped() -> Self {
        Self::new(MockBehavior::Swapped)
    }

    /// Create a mock whose entry numbers drift away from the source lines
    pub fn drifted() -> Self {
        Self::new(MockBehavior::Drifted)
    }

    /// Create an intermittently failing mock backend
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock backend that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns unusable responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that waits before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&TranslationPrompt) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// The translation the working mock gives a line
    pub fn translate_text(text: &str) -> String {
        format!("{}{}", TRANSLATED_PREFIX, text)
    }

    /// Generate a properly formatted response for the lines
    pub fn generate_response(lines: &[SubtitleLine]) -> String {
        let mut response = lines
            .iter()
            .map(|line| format_entry(line.number, &line.text, &Self::translate_text(&line.text)))
            .collect::<Vec<_>>()
            .join("\n");
        response.push_str(&Self::summary_tag(lines));
        response
    }

    /// Generate a response that skips every second line
    pub fn generate_partial_response(lines: &[SubtitleLine]) -> String {
        let kept: Vec<SubtitleLine> = lines.iter().step_by(2).cloned().collect();
        Self::generate_response(&kept)
    }

    /// Generate a response with original and translation swapped
    pub fn generate_swapped_response(lines: &[SubtitleLine]) -> String {
        lines
            .iter()
            .map(|line| format_entry(line.number, &Self::translate_text(&line.text), &line.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Generate a response where every second entry is numbered `DRIFT_OFFSET` too high
    pub fn generate_drifted_response(lines: &[SubtitleLine]) -> String {
        let mut response = lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let number = if index % 2 == 1 { line.number + DRIFT_OFFSET } else { line.number };
                format_entry(number, &line.text, &Self::translate_text(&line.text))
            })
            .collect::<Vec<_>>()
            .join("\n");
        response.push_str(&Self::summary_tag(lines));
        response
    }

    fn summary_tag(lines: &[SubtitleLine]) -> String {
        match (lines.first(), lines.last()) {
            (Some(first), Some(last)) => format!(
                "\n<summary>Lines {} to {}</summary>\n",
                first.number, last.number
            ),
            _ => String::new(),
        }
    }

    fn respond(&self, prompt: &TranslationPrompt) -> String {
        match self.custom_response {
            Some(generator) => generator(prompt),
            None => Self::generate_response(&prompt.lines),
        }
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(&self, prompt: &TranslationPrompt) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(self.respond(prompt)),

            MockBehavior::Partial => Ok(Self::generate_partial_response(&prompt.lines)),

            MockBehavior::Swapped => Ok(Self::generate_swapped_response(&prompt.lines)),

            MockBehavior::Drifted => Ok(Self::generate_drifted_response(&prompt.lines)),

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.respond(prompt))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated backend failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok("I'm sorry, I can't help with that.".to_string()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(self.respond(prompt))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
