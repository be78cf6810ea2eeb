/*!
 * Field edits on lines, batches and scenes.
 *
 * Each edit records the values it overwrote and restores them on undo.
 */

use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;

use crate::errors::{CommandError, DocumentError, UndoError};
use crate::model_update::{BatchUpdate, LineUpdate, ModelUpdate, SceneUpdate};
use crate::subtitles::{SubtitleDocument, SubtitleLine};

use super::{Command, CommandContext, CommandState};

/// Changes to one line. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineEdit {
    pub text: Option<String>,
    /// `Some(None)` removes the translation
    pub translation: Option<Option<String>>,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

impl LineEdit {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn translation(translation: Option<String>) -> Self {
        Self {
            translation: Some(translation),
            ..Self::default()
        }
    }

    pub fn timing(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
            ..Self::default()
        }
    }
}

/// A line and its translated counterpart before an edit
#[derive(Debug, Clone)]
struct LineRecord {
    original: SubtitleLine,
    translated: Option<SubtitleLine>,
}

/// Edit the text, translation or timing of one line
#[derive(Debug)]
pub struct EditLineCommand {
    number: usize,
    edit: LineEdit,
    previous: Option<LineRecord>,
    state: CommandState,
}

impl EditLineCommand {
    pub fn new(number: usize, edit: LineEdit) -> Self {
        Self {
            number,
            edit,
            previous: None,
            state: CommandState::new(),
        }
    }

    /// Put a line and its translation back into the batch that holds it
    fn restore_line(doc: &mut SubtitleDocument, record: LineRecord) -> Result<ModelUpdate, DocumentError> {
        let number = record.original.number;
        let batch = doc
            .scenes
            .iter_mut()
            .flat_map(|s| s.batches.iter_mut())
            .find(|b| b.spans(number))
            .ok_or(DocumentError::LineNotFound(number))?;
        let key = (batch.scene, batch.number, number);

        let update = LineUpdate {
            text: Some(record.original.text.clone()),
            translation: Some(record.original.translation.clone()),
            start_ms: Some(record.original.start_ms),
            end_ms: Some(record.original.end_ms),
        };
        let original = batch
            .get_original_mut(number)
            .ok_or(DocumentError::LineNotFound(number))?;
        *original = record.original;
        batch.translated.retain(|l| l.number != number);
        if let Some(translated) = record.translated {
            let index = batch.translated.partition_point(|l| l.number < number);
            batch.translated.insert(index, translated);
        }

        let mut model_update = ModelUpdate::new();
        model_update.lines.update(key, update);
        Ok(model_update)
    }
}

#[async_trait]
impl Command for EditLineCommand {
    fn name(&self) -> &'static str {
        "EditLineCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (number, edit) = (self.number, &self.edit);
        let (previous, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let scene_number = doc.get_batch_containing_line(number)?.scene;
                let batch_number = doc.get_batch_containing_line(number)?.number;
                let batch = doc.get_batch_mut(scene_number, batch_number)?;
                let previous = LineRecord {
                    original: batch
                        .get_original(number)
                        .cloned()
                        .ok_or(DocumentError::LineNotFound(number))?,
                    translated: batch.get_translated(number).cloned(),
                };

                let line = batch
                    .get_original_mut(number)
                    .ok_or(DocumentError::LineNotFound(number))?;
                if let Some(text) = &edit.text {
                    line.text = text.clone();
                }
                if let Some(start_ms) = edit.start_ms {
                    line.start_ms = start_ms;
                }
                if let Some(end_ms) = edit.end_ms {
                    line.end_ms = end_ms;
                }
                let line = line.clone();
                if let Some(translated) = batch.translated.iter_mut().find(|l| l.number == number) {
                    translated.start_ms = line.start_ms;
                    translated.end_ms = line.end_ms;
                }
                match &edit.translation {
                    Some(Some(translation)) => batch.set_translations(vec![line.translated(translation.clone())]),
                    Some(None) => {
                        batch.translated.retain(|l| l.number != number);
                        if let Some(original) = batch.get_original_mut(number) {
                            original.translation = None;
                        }
                    }
                    None => {}
                }

                let mut update = ModelUpdate::new();
                update.lines.update(
                    (scene_number, batch_number, number),
                    LineUpdate {
                        text: edit.text.clone(),
                        translation: edit.translation.clone(),
                        start_ms: edit.start_ms,
                        end_ms: edit.end_ms,
                    },
                );
                Ok((previous, update))
            })
            .map_err(|source| CommandError::document(self.name(), source))?;

        debug!("Edited line {}", self.number);
        self.previous = Some(previous);
        self.state.add_model_update(update);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let previous = self
            .previous
            .take()
            .ok_or(UndoError::MissingUndoData(self.name()))?;
        let update = context
            .document
            .write(|doc| Self::restore_line(doc, previous))
            .map_err(|source| UndoError::Document {
                command: self.name(),
                source,
            })?;
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Summary and context of a batch or scene
#[derive(Debug, Clone, Default, PartialEq)]
struct Metadata {
    summary: Option<String>,
    context: BTreeMap<String, String>,
}

/// Edit the summary or context of a batch
#[derive(Debug)]
pub struct EditBatchCommand {
    scene: usize,
    batch: usize,
    summary: Option<Option<String>>,
    context: Option<BTreeMap<String, String>>,
    previous: Option<Metadata>,
    state: CommandState,
}

impl EditBatchCommand {
    pub fn new(scene: usize, batch: usize) -> Self {
        Self {
            scene,
            batch,
            summary: None,
            context: None,
            previous: None,
            state: CommandState::new(),
        }
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = Some(context);
        self
    }

    fn apply(
        &self,
        doc: &mut SubtitleDocument,
        summary: Option<Option<String>>,
        context: Option<BTreeMap<String, String>>,
    ) -> Result<(Metadata, ModelUpdate), DocumentError> {
        let batch = doc.get_batch_mut(self.scene, self.batch)?;
        let previous = Metadata {
            summary: batch.summary.clone(),
            context: batch.context.clone(),
        };
        if let Some(summary) = &summary {
            batch.summary = summary.clone();
        }
        if let Some(context) = &context {
            batch.context = context.clone();
        }

        let mut update = ModelUpdate::new();
        update.batches.update(
            (self.scene, self.batch),
            BatchUpdate {
                summary,
                context,
                ..BatchUpdate::default()
            },
        );
        Ok((previous, update))
    }
}

#[async_trait]
impl Command for EditBatchCommand {
    fn name(&self) -> &'static str {
        "EditBatchCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (summary, batch_context) = (self.summary.clone(), self.context.clone());
        let (previous, update) = context
            .document
            .write(|doc| self.apply(doc, summary, batch_context))
            .map_err(|source| CommandError::document(self.name(), source))?;
        self.previous = Some(previous);
        self.state.add_model_update(update);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let previous = self
            .previous
            .take()
            .ok_or(UndoError::MissingUndoData(self.name()))?;
        let (_, update) = context
            .document
            .write(|doc| self.apply(doc, Some(previous.summary), Some(previous.context)))
            .map_err(|source| UndoError::Document {
                command: self.name(),
                source,
            })?;
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Edit the summary or context of a scene
#[derive(Debug)]
pub struct EditSceneCommand {
    scene: usize,
    summary: Option<Option<String>>,
    context: Option<BTreeMap<String, String>>,
    previous: Option<Metadata>,
    state: CommandState,
}

impl EditSceneCommand {
    pub fn new(scene: usize) -> Self {
        Self {
            scene,
            summary: None,
            context: None,
            previous: None,
            state: CommandState::new(),
        }
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = Some(context);
        self
    }

    fn apply(
        &self,
        doc: &mut SubtitleDocument,
        summary: Option<Option<String>>,
        context: Option<BTreeMap<String, String>>,
    ) -> Result<(Metadata, ModelUpdate), DocumentError> {
        let scene = doc.get_scene_mut(self.scene)?;
        let previous = Metadata {
            summary: scene.summary.clone(),
            context: scene.context.clone(),
        };
        if let Some(summary) = &summary {
            scene.summary = summary.clone();
        }
        if let Some(context) = &context {
            scene.context = context.clone();
        }

        let mut update = ModelUpdate::new();
        update.scenes.update(self.scene, SceneUpdate { summary, context });
        Ok((previous, update))
    }
}

#[async_trait]
impl Command for EditSceneCommand {
    fn name(&self) -> &'static str {
        "EditSceneCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (summary, scene_context) = (self.summary.clone(), self.context.clone());
        let (previous, update) = context
            .document
            .write(|doc| self.apply(doc, summary, scene_context))
            .map_err(|source| CommandError::document(self.name(), source))?;
        self.previous = Some(previous);
        self.state.add_model_update(update);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let previous = self
            .previous
            .take()
            .ok_or(UndoError::MissingUndoData(self.name()))?;
        let (_, update) = context
            .document
            .write(|doc| self.apply(doc, Some(previous.summary), Some(previous.context)))
            .map_err(|source| UndoError::Document {
                command: self.name(),
                source,
            })?;
        self.state.add_model_update(update);
        Ok(())
    }
}
