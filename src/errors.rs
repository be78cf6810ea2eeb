/*!
 * Error types for the subtrans library.
 *
 * Structural failures, backend failures, translation failures, command and
 * undo failures each get their own enum, using the thiserror crate for
 * ergonomic error definitions. Validation faults are plain data: they are
 * attached to batches rather than propagated.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invariant violations and stale lookups in the document model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// No scene with this number
    #[error("Scene {0} not found")]
    SceneNotFound(usize),

    /// No batch with this number in the scene
    #[error("Batch ({scene},{batch}) not found")]
    BatchNotFound {
        /// Scene number
        scene: usize,
        /// Batch number within the scene
        batch: usize,
    },

    /// No line with this number
    #[error("Line {0} not found")]
    LineNotFound(usize),

    /// A line with this number already exists
    #[error("Line {0} already exists")]
    DuplicateLine(usize),

    /// Merge or split targets were not a sorted, contiguous run
    #[error("{what} numbers must be a sorted contiguous run, got {numbers:?}")]
    NonContiguous {
        /// "Scene" or "Batch"
        what: &'static str,
        /// The offending numbers
        numbers: Vec<usize>,
    },

    /// Split point does not produce two non-empty parts
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// Batch is smaller than twice the minimum batch size
    #[error("Batch too small to split: {size} lines, need at least {required}")]
    BatchTooSmall {
        /// Lines in the batch
        size: usize,
        /// Lines required to split
        required: usize,
    },

    /// Scene, batch or line numbering is out of sequence
    #[error("Numbering violation: {0}")]
    NumberingViolation(String),

    /// The document has no scenes
    #[error("Document is empty")]
    Empty,
}

/// Errors reported by a translation backend
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making a request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error returned by the backend itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors that can occur during translation of a batch
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// The response contained nothing the parser could use
    #[error("No translation found in response")]
    NoTranslation,

    /// The response could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Error from the backend
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Translation was stopped by an abort request
    #[error("Translation aborted")]
    Aborted,
}

/// Line-level faults found while validating a translated batch.
///
/// These are stored on the batch as data, never thrown.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lines")]
pub enum ValidationError {
    /// Nothing was parsed from the response
    #[error("No translation found")]
    NoTranslation,

    /// Source lines without a translation
    #[error("No translation for lines {0:?}")]
    UnmatchedLines(Vec<usize>),

    /// Translations that are empty
    #[error("Empty translation for lines {0:?}")]
    EmptyLines(Vec<usize>),

    /// Translations with more newlines than allowed
    #[error("Too many newlines in lines {0:?}")]
    TooManyNewlines(Vec<usize>),

    /// Translations with a line longer than allowed
    #[error("Line too long in lines {0:?}")]
    LineTooLong(Vec<usize>),

    /// Translations whose number has no original in the batch
    #[error("Translations without an original: {0:?}")]
    OrphanedTranslations(Vec<usize>),
}

/// Execution failure of a command, naming the command that raised it
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// A structural edit failed
    #[error("{command} failed: {source}")]
    Document {
        /// Command name
        command: &'static str,
        /// Underlying cause
        #[source]
        source: DocumentError,
    },

    /// A translation failed
    #[error("{command} failed: {source}")]
    Translation {
        /// Command name
        command: &'static str,
        /// Underlying cause
        #[source]
        source: TranslationError,
    },

    /// Any other failure
    #[error("{command} failed: {message}")]
    Failed {
        /// Command name
        command: &'static str,
        /// Description of the failure
        message: String,
    },

    /// The command stopped because it was aborted
    #[error("{command} was aborted")]
    Aborted {
        /// Command name
        command: &'static str,
    },
}

impl CommandError {
    /// Wrap a document error for the named command
    pub fn document(command: &'static str, source: DocumentError) -> Self {
        Self::Document { command, source }
    }

    /// Wrap a translation error for the named command
    pub fn translation(command: &'static str, source: TranslationError) -> Self {
        Self::Translation { command, source }
    }

    /// The name of the command that failed
    pub fn command(&self) -> &'static str {
        match self {
            Self::Document { command, .. }
            | Self::Translation { command, .. }
            | Self::Failed { command, .. }
            | Self::Aborted { command } => command,
        }
    }
}

/// Errors raised by undo and redo requests
#[derive(Error, Debug, Clone)]
pub enum UndoError {
    /// The undo stack is empty
    #[error("Nothing to undo")]
    NothingToUndo,

    /// The redo stack is empty
    #[error("Nothing to redo")]
    NothingToRedo,

    /// The command on top of the stack cannot be undone
    #[error("{0} cannot be undone")]
    NotUndoable(&'static str),

    /// The command opted out of undo and was asked to undo anyway
    #[error("{0} does not support undo")]
    SkipUndo(&'static str),

    /// A blocking command is running
    #[error("Cannot undo while a blocking command is running")]
    Busy,

    /// The command has no recorded state to undo from
    #[error("{0} has no undo data")]
    MissingUndoData(&'static str),

    /// Undo failed to apply to the document
    #[error("Undo of {command} failed: {source}")]
    Document {
        /// Command name
        command: &'static str,
        /// Underlying cause
        #[source]
        source: DocumentError,
    },

    /// Redo re-execution failed
    #[error("Redo failed: {0}")]
    Redo(#[from] CommandError),

    /// The queue worker is no longer running
    #[error("Command queue has stopped")]
    QueueStopped,
}

/// Errors raised by the command queue itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The worker has stopped and accepts no more work
    #[error("Command queue has stopped")]
    Stopped,

    /// The worker did not finish within the stop timeout
    #[error("Command queue did not stop within {0} ms")]
    StopTimeout(u64),
}

/// Errors in configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field
        field: &'static str,
        /// Why the value is rejected
        reason: String,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the document model
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from a command
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Error from undo/redo
    #[error("Undo error: {0}")]
    Undo(#[from] UndoError),

    /// Error from the command queue
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Error from configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
