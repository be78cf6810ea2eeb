/*!
 * Reversible units of work over the document.
 *
 * A command reads and mutates the document through the shared
 * `DocumentHandle`, records what it needs to undo itself, and describes what
 * it changed as `ModelUpdate`s. Commands are executed by the `CommandQueue`:
 *
 * - `structure`: batching, merges, splits, insertion, deletion, renumbering
 * - `edit`: line, batch and scene field edits
 * - `translate`: scene translation and response reparsing
 * - `queue`: the scheduler and undo/redo history
 *
 * The document lock is never held across an `.await`: commands lock only
 * inside synchronous `read`/`write` closures.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::app_config::Config;
use crate::errors::{CommandError, UndoError};
use crate::model_update::ModelUpdate;
use crate::providers::TranslationBackend;
use crate::subtitles::DocumentHandle;

pub mod edit;
pub mod queue;
pub mod structure;
pub mod translate;

pub use edit::{EditBatchCommand, EditLineCommand, EditSceneCommand, LineEdit};
pub use queue::{CommandQueue, QueueEvent, QueueHistory};
pub use structure::{
    AutoSplitBatchCommand, BatchSubtitlesCommand, DeleteLinesCommand, InsertLinesCommand,
    MergeBatchesCommand, MergeScenesCommand, RenumberCommand, SplitBatchCommand,
    SplitSceneCommand,
};
pub use translate::{ReparseBatchesCommand, StartTranslationCommand, TranslateSceneCommand};

/// Everything a command may use while executing
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// The shared document
    pub document: DocumentHandle,

    /// Component configuration
    pub config: Arc<Config>,

    /// Translation backend, if translation is available
    pub backend: Option<Arc<dyn TranslationBackend>>,
}

impl CommandContext {
    pub fn new(document: DocumentHandle, config: Config) -> Self {
        Self {
            document,
            config: Arc::new(config),
            backend: None,
        }
    }

    /// Set the translation backend
    pub fn with_backend(mut self, backend: Arc<dyn TranslationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// Cooperative abort flag shared between a command and its queue
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Request an abort
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Flags and outputs common to every command
#[derive(Debug)]
pub struct CommandState {
    /// Unique id reported in queue events
    pub id: Uuid,

    /// Whether undo is possible. A command that cannot be undone still goes
    /// on the undo stack and blocks undo past it.
    pub can_undo: bool,

    /// Whether the command stays off the undo stack altogether
    pub skip_undo: bool,

    /// Whether the command must run alone
    pub is_blocking: bool,

    /// Whether a failure drops the follow-on commands
    pub terminal: bool,

    abort: AbortHandle,
    model_updates: Vec<ModelUpdate>,
    follow_ons: Vec<Box<dyn Command>>,
}

impl Default for CommandState {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            can_undo: true,
            skip_undo: false,
            is_blocking: true,
            terminal: false,
            abort: AbortHandle::default(),
            model_updates: Vec::new(),
            follow_ons: Vec::new(),
        }
    }
}

impl CommandState {
    /// State for a blocking, undoable command
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a command that may run alongside others
    pub fn non_blocking() -> Self {
        Self {
            is_blocking: false,
            ..Self::default()
        }
    }

    pub fn with_can_undo(mut self, can_undo: bool) -> Self {
        self.can_undo = can_undo;
        self
    }

    pub fn with_skip_undo(mut self, skip_undo: bool) -> Self {
        self.skip_undo = skip_undo;
        self
    }

    pub fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    /// Request a cooperative abort
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// A handle that can abort the command after it has been moved
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Record a change, ignoring empty updates
    pub fn add_model_update(&mut self, update: ModelUpdate) {
        if !update.is_empty() {
            self.model_updates.push(update);
        }
    }

    pub fn model_updates(&self) -> &[ModelUpdate] {
        &self.model_updates
    }

    pub fn take_model_updates(&mut self) -> Vec<ModelUpdate> {
        std::mem::take(&mut self.model_updates)
    }

    /// Queue a command to run right after this one completes
    pub fn add_follow_on(&mut self, command: Box<dyn Command>) {
        self.follow_ons.push(command);
    }

    pub fn follow_ons(&self) -> &[Box<dyn Command>] {
        &self.follow_ons
    }

    pub fn take_follow_ons(&mut self) -> Vec<Box<dyn Command>> {
        std::mem::take(&mut self.follow_ons)
    }

    /// Clear outputs and the abort flag before a re-execution
    pub fn reset(&mut self) {
        self.abort.reset();
        self.model_updates.clear();
        self.follow_ons.clear();
    }
}

/// A reversible unit of work
#[async_trait]
pub trait Command: Send + Sync + Debug {
    /// Name used in events and error messages
    fn name(&self) -> &'static str;

    fn state(&self) -> &CommandState;

    fn state_mut(&mut self) -> &mut CommandState;

    /// Apply the command to the document
    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError>;

    /// Reverse a successful execution
    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError>;

    /// Called when the command finished because it was aborted
    fn on_abort(&mut self) {}

    /// Check the flags that allow undo
    fn check_undo(&self) -> Result<(), UndoError> {
        if self.state().skip_undo {
            return Err(UndoError::SkipUndo(self.name()));
        }
        if !self.state().can_undo {
            return Err(UndoError::NotUndoable(self.name()));
        }
        Ok(())
    }

    /// Return an abort error if an abort was requested
    fn check_aborted(&self) -> Result<(), CommandError> {
        if self.state().is_aborted() {
            Err(CommandError::Aborted {
                command: self.name(),
            })
        } else {
            Ok(())
        }
    }
}
