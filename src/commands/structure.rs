/*!
 * Commands that change the scene/batch/line structure.
 *
 * Merges and splits are undone with the inverse operation plus the
 * summaries and context they overwrote. Deletion, insertion and renumbering
 * touch arbitrary parts of the document and are undone from a snapshot of
 * the scene list.
 */

use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;

use crate::batcher::SubtitleBatcher;
use crate::errors::{CommandError, DocumentError, UndoError, ValidationError};
use crate::model_update::ModelUpdate;
use crate::subtitles::{SubtitleDocument, SubtitleLine, SubtitleScene};

use super::{Command, CommandContext, CommandState};

fn undo_error(command: &'static str) -> impl Fn(DocumentError) -> UndoError {
    move |source| UndoError::Document { command, source }
}

fn command_error(command: &'static str) -> impl Fn(DocumentError) -> CommandError {
    move |source| CommandError::document(command, source)
}

/// Build the document from a flat line list.
///
/// The previous document is discarded, so this command cannot be undone and
/// acts as a barrier in the undo history.
#[derive(Debug)]
pub struct BatchSubtitlesCommand {
    lines: Vec<SubtitleLine>,
    state: CommandState,
}

impl BatchSubtitlesCommand {
    pub fn new(lines: Vec<SubtitleLine>) -> Self {
        Self {
            lines,
            state: CommandState::new().with_can_undo(false),
        }
    }
}

#[async_trait]
impl Command for BatchSubtitlesCommand {
    fn name(&self) -> &'static str {
        "BatchSubtitlesCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let batcher = SubtitleBatcher::new(context.config.batcher.clone());
        let mut document = SubtitleDocument::new(batcher.batch_subtitles(&self.lines));
        document.renumber();

        let previous = context.document.replace(document);
        let update = context
            .document
            .read(|doc| ModelUpdate::scenes_from(doc, 1, previous.scene_count()));
        self.state.add_model_update(update);

        info!("Batched {} lines", self.lines.len());
        Ok(())
    }

    fn undo(&mut self, _context: &CommandContext) -> Result<(), UndoError> {
        Err(UndoError::NotUndoable(self.name()))
    }
}

/// Scene fields overwritten by a merge
#[derive(Debug, Clone)]
struct SceneRecord {
    batches: usize,
    summary: Option<String>,
    context: BTreeMap<String, String>,
}

/// Merge a contiguous run of scenes
#[derive(Debug)]
pub struct MergeScenesCommand {
    numbers: Vec<usize>,
    records: Vec<SceneRecord>,
    state: CommandState,
}

impl MergeScenesCommand {
    pub fn new(numbers: Vec<usize>) -> Self {
        Self {
            numbers,
            records: Vec::new(),
            state: CommandState::new(),
        }
    }
}

#[async_trait]
impl Command for MergeScenesCommand {
    fn name(&self) -> &'static str {
        "MergeScenesCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let numbers = &self.numbers;
        let (records, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.scene_count();
                let records = numbers
                    .iter()
                    .map(|&number| {
                        doc.get_scene(number).map(|scene| SceneRecord {
                            batches: scene.size(),
                            summary: scene.summary.clone(),
                            context: scene.context.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                doc.merge_scenes(numbers)?;
                Ok((records, ModelUpdate::scenes_from(doc, numbers[0], previous_count)))
            })
            .map_err(command_error(self.name()))?;

        self.records = records;
        self.state.add_model_update(update);
        info!("Merged scenes {:?}", self.numbers);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        if self.records.is_empty() {
            return Err(UndoError::MissingUndoData(self.name()));
        }

        let first = self.numbers[0];
        let records = &self.records;
        let update = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.scene_count();
                let mut offset: usize = records.iter().map(|r| r.batches).sum();
                for record in records.iter().skip(1).rev() {
                    offset -= record.batches;
                    doc.split_scene(first, offset + 1)?;
                }
                for (index, record) in records.iter().enumerate() {
                    let scene = doc.get_scene_mut(first + index)?;
                    scene.summary = record.summary.clone();
                    scene.context = record.context.clone();
                }
                Ok(ModelUpdate::scenes_from(doc, first, previous_count))
            })
            .map_err(undo_error(self.name()))?;

        self.records.clear();
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Batch fields overwritten by a merge
#[derive(Debug, Clone)]
struct BatchRecord {
    first_line: Option<usize>,
    first_translated: Option<usize>,
    summary: Option<String>,
    context: BTreeMap<String, String>,
    errors: Vec<ValidationError>,
    response: Option<String>,
    fuzzy_matches: Vec<usize>,
}

/// Merge a contiguous run of batches within a scene
#[derive(Debug)]
pub struct MergeBatchesCommand {
    scene: usize,
    numbers: Vec<usize>,
    records: Vec<BatchRecord>,
    state: CommandState,
}

impl MergeBatchesCommand {
    pub fn new(scene: usize, numbers: Vec<usize>) -> Self {
        Self {
            scene,
            numbers,
            records: Vec::new(),
            state: CommandState::new(),
        }
    }
}

#[async_trait]
impl Command for MergeBatchesCommand {
    fn name(&self) -> &'static str {
        "MergeBatchesCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (scene_number, numbers) = (self.scene, &self.numbers);
        let (records, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.get_scene(scene_number)?.size();
                let records = numbers
                    .iter()
                    .map(|&number| {
                        doc.get_batch(scene_number, number).map(|batch| BatchRecord {
                            first_line: batch.first_line_number(),
                            first_translated: batch.translated.first().map(|l| l.number),
                            summary: batch.summary.clone(),
                            context: batch.context.clone(),
                            errors: batch.errors.clone(),
                            response: batch.response.clone(),
                            fuzzy_matches: batch.fuzzy_matches.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                doc.merge_batches(scene_number, numbers)?;
                let scene = doc.get_scene(scene_number)?;
                Ok((records, ModelUpdate::batches_from(scene, numbers[0], previous_count)))
            })
            .map_err(command_error(self.name()))?;

        self.records = records;
        self.state.add_model_update(update);
        info!("Merged batches {:?} in scene {}", self.numbers, self.scene);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        if self.records.is_empty() {
            return Err(UndoError::MissingUndoData(self.name()));
        }

        let (scene_number, first) = (self.scene, self.numbers[0]);
        let records = &self.records;
        let update = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.get_scene(scene_number)?.size();
                for record in records.iter().skip(1).rev() {
                    let at_line = record.first_line.ok_or_else(|| {
                        DocumentError::InvalidSplit("merged batch had no lines".to_string())
                    })?;
                    doc.split_batch(scene_number, first, at_line, record.first_translated)?;
                }
                for (index, record) in records.iter().enumerate() {
                    let batch = doc.get_batch_mut(scene_number, first + index)?;
                    batch.summary = record.summary.clone();
                    batch.context = record.context.clone();
                    batch.errors = record.errors.clone();
                    batch.response = record.response.clone();
                    batch.fuzzy_matches = record.fuzzy_matches.clone();
                }
                let scene = doc.get_scene(scene_number)?;
                Ok(ModelUpdate::batches_from(scene, first, previous_count))
            })
            .map_err(undo_error(self.name()))?;

        self.records.clear();
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Move a batch and the batches after it into a new scene
#[derive(Debug)]
pub struct SplitSceneCommand {
    scene: usize,
    at_batch: usize,
    summary: Option<Option<String>>,
    state: CommandState,
}

impl SplitSceneCommand {
    pub fn new(scene: usize, at_batch: usize) -> Self {
        Self {
            scene,
            at_batch,
            summary: None,
            state: CommandState::new(),
        }
    }
}

#[async_trait]
impl Command for SplitSceneCommand {
    fn name(&self) -> &'static str {
        "SplitSceneCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (scene_number, at_batch) = (self.scene, self.at_batch);
        let (summary, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.scene_count();
                let summary = doc.get_scene(scene_number)?.summary.clone();
                doc.split_scene(scene_number, at_batch)?;
                Ok((summary, ModelUpdate::scenes_from(doc, scene_number, previous_count)))
            })
            .map_err(command_error(self.name()))?;

        self.summary = Some(summary);
        self.state.add_model_update(update);
        info!("Split scene {} at batch {}", self.scene, self.at_batch);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let summary = self
            .summary
            .clone()
            .ok_or(UndoError::MissingUndoData(self.name()))?;

        let scene_number = self.scene;
        let update = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.scene_count();
                doc.merge_scenes(&[scene_number, scene_number + 1])?;
                doc.get_scene_mut(scene_number)?.summary = summary;
                Ok(ModelUpdate::scenes_from(doc, scene_number, previous_count))
            })
            .map_err(undo_error(self.name()))?;

        self.summary = None;
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Undo a batch split by merging the two halves back
fn merge_split_batch(
    doc: &mut SubtitleDocument,
    scene_number: usize,
    batch_number: usize,
    summary: Option<String>,
) -> Result<ModelUpdate, DocumentError> {
    let previous_count = doc.get_scene(scene_number)?.size();
    doc.merge_batches(scene_number, &[batch_number, batch_number + 1])?;
    doc.get_batch_mut(scene_number, batch_number)?.summary = summary;
    let scene = doc.get_scene(scene_number)?;
    Ok(ModelUpdate::batches_from(scene, batch_number, previous_count))
}

/// Split a batch at a line number
#[derive(Debug)]
pub struct SplitBatchCommand {
    scene: usize,
    batch: usize,
    at_line: usize,
    at_translated_line: Option<usize>,
    summary: Option<Option<String>>,
    state: CommandState,
}

impl SplitBatchCommand {
    pub fn new(scene: usize, batch: usize, at_line: usize) -> Self {
        Self {
            scene,
            batch,
            at_line,
            at_translated_line: None,
            summary: None,
            state: CommandState::new(),
        }
    }

    /// Split the translations at a different line than the originals
    pub fn with_translated_line(mut self, at_translated_line: usize) -> Self {
        self.at_translated_line = Some(at_translated_line);
        self
    }
}

#[async_trait]
impl Command for SplitBatchCommand {
    fn name(&self) -> &'static str {
        "SplitBatchCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (scene_number, batch_number) = (self.scene, self.batch);
        let (at_line, at_translated_line) = (self.at_line, self.at_translated_line);
        let (summary, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.get_scene(scene_number)?.size();
                let summary = doc.get_batch(scene_number, batch_number)?.summary.clone();
                doc.split_batch(scene_number, batch_number, at_line, at_translated_line)?;
                let scene = doc.get_scene(scene_number)?;
                Ok((summary, ModelUpdate::batches_from(scene, batch_number, previous_count)))
            })
            .map_err(command_error(self.name()))?;

        self.summary = Some(summary);
        self.state.add_model_update(update);
        info!("Split batch ({},{}) at line {}", self.scene, self.batch, self.at_line);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let summary = self
            .summary
            .clone()
            .ok_or(UndoError::MissingUndoData(self.name()))?;

        let (scene_number, batch_number) = (self.scene, self.batch);
        let update = context
            .document
            .write(|doc| merge_split_batch(doc, scene_number, batch_number, summary))
            .map_err(undo_error(self.name()))?;

        self.summary = None;
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Split a batch at the best gap near its middle
#[derive(Debug)]
pub struct AutoSplitBatchCommand {
    scene: usize,
    batch: usize,
    min_size: Option<usize>,
    split_line: Option<usize>,
    summary: Option<Option<String>>,
    state: CommandState,
}

impl AutoSplitBatchCommand {
    /// Split using the configured minimum batch size
    pub fn new(scene: usize, batch: usize) -> Self {
        Self {
            scene,
            batch,
            min_size: None,
            split_line: None,
            summary: None,
            state: CommandState::new(),
        }
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = Some(min_size);
        self
    }

    /// First line of the new batch, once executed
    pub fn split_line(&self) -> Option<usize> {
        self.split_line
    }
}

#[async_trait]
impl Command for AutoSplitBatchCommand {
    fn name(&self) -> &'static str {
        "AutoSplitBatchCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (scene_number, batch_number) = (self.scene, self.batch);
        let min_size = self.min_size.unwrap_or(context.config.batcher.min_batch_size);
        let (split_line, summary, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.get_scene(scene_number)?.size();
                let summary = doc.get_batch(scene_number, batch_number)?.summary.clone();
                let split_line = doc.auto_split_batch(scene_number, batch_number, min_size)?;
                let scene = doc.get_scene(scene_number)?;
                Ok((
                    split_line,
                    summary,
                    ModelUpdate::batches_from(scene, batch_number, previous_count),
                ))
            })
            .map_err(command_error(self.name()))?;

        self.split_line = Some(split_line);
        self.summary = Some(summary);
        self.state.add_model_update(update);
        info!("Split batch ({},{}) at line {}", self.scene, self.batch, split_line);
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let summary = self
            .summary
            .clone()
            .ok_or(UndoError::MissingUndoData(self.name()))?;

        let (scene_number, batch_number) = (self.scene, self.batch);
        let update = context
            .document
            .write(|doc| merge_split_batch(doc, scene_number, batch_number, summary))
            .map_err(undo_error(self.name()))?;

        self.summary = None;
        self.split_line = None;
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Scene list captured before an edit that is undone wholesale
#[derive(Debug, Clone)]
struct Snapshot {
    scenes: Vec<SubtitleScene>,
    first_scene: usize,
}

/// Restore a snapshot, describing the change from its first affected scene
fn restore_snapshot(doc: &mut SubtitleDocument, snapshot: Snapshot) -> ModelUpdate {
    let previous_count = doc.scene_count();
    doc.restore_scenes(snapshot.scenes);
    ModelUpdate::scenes_from(doc, snapshot.first_scene, previous_count)
}

/// Delete lines by number
#[derive(Debug)]
pub struct DeleteLinesCommand {
    numbers: Vec<usize>,
    snapshot: Option<Snapshot>,
    state: CommandState,
}

impl DeleteLinesCommand {
    pub fn new(numbers: Vec<usize>) -> Self {
        Self {
            numbers,
            snapshot: None,
            state: CommandState::new(),
        }
    }
}

#[async_trait]
impl Command for DeleteLinesCommand {
    fn name(&self) -> &'static str {
        "DeleteLinesCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let numbers = &self.numbers;
        let (snapshot, deleted, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.scene_count();
                let mut first_scene = previous_count;
                for &number in numbers {
                    first_scene = first_scene.min(doc.get_batch_containing_line(number)?.scene);
                }
                let snapshot = Snapshot {
                    scenes: doc.scenes.clone(),
                    first_scene,
                };
                let deleted = doc.delete_lines(numbers)?;
                let update = ModelUpdate::scenes_from(doc, first_scene, previous_count);
                Ok((snapshot, deleted, update))
            })
            .map_err(command_error(self.name()))?;

        self.snapshot = Some(snapshot);
        self.state.add_model_update(update);
        info!(
            "Deleted {} lines from {} batches",
            self.numbers.len(),
            deleted.len()
        );
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let snapshot = self
            .snapshot
            .take()
            .ok_or(UndoError::MissingUndoData(self.name()))?;
        let update = context.document.write(|doc| restore_snapshot(doc, snapshot));
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Insert lines into the batches their numbers fall into
#[derive(Debug)]
pub struct InsertLinesCommand {
    originals: Vec<SubtitleLine>,
    translated: Vec<SubtitleLine>,
    snapshot: Option<Snapshot>,
    state: CommandState,
}

impl InsertLinesCommand {
    pub fn new(originals: Vec<SubtitleLine>, translated: Vec<SubtitleLine>) -> Self {
        Self {
            originals,
            translated,
            snapshot: None,
            state: CommandState::new(),
        }
    }
}

#[async_trait]
impl Command for InsertLinesCommand {
    fn name(&self) -> &'static str {
        "InsertLinesCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (originals, translated) = (&self.originals, &self.translated);
        let (snapshot, update) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let previous_count = doc.scene_count();
                let mut first_scene = previous_count;
                for line in originals.iter().chain(translated.iter()) {
                    first_scene = first_scene.min(doc.insert_target(line.number)?.0);
                }

                let scenes = doc.scenes.clone();
                doc.insert_lines(originals.clone(), translated.clone())?;
                let update = ModelUpdate::scenes_from(doc, first_scene, previous_count);
                Ok((Snapshot { scenes, first_scene }, update))
            })
            .map_err(command_error(self.name()))?;

        self.snapshot = Some(snapshot);
        self.state.add_model_update(update);
        info!("Inserted {} lines", self.originals.len());
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let snapshot = self
            .snapshot
            .take()
            .ok_or(UndoError::MissingUndoData(self.name()))?;
        let update = context.document.write(|doc| restore_snapshot(doc, snapshot));
        self.state.add_model_update(update);
        Ok(())
    }
}

/// Renumber scenes, batches and lines sequentially
#[derive(Debug)]
pub struct RenumberCommand {
    snapshot: Option<Snapshot>,
    state: CommandState,
}

impl RenumberCommand {
    pub fn new() -> Self {
        Self {
            snapshot: None,
            state: CommandState::new(),
        }
    }
}

impl Default for RenumberCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for RenumberCommand {
    fn name(&self) -> &'static str {
        "RenumberCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let (snapshot, update) = context.document.write(|doc| {
            let count = doc.scene_count();
            let snapshot = Snapshot {
                scenes: doc.scenes.clone(),
                first_scene: 1,
            };
            doc.renumber();
            (snapshot, ModelUpdate::scenes_from(doc, 1, count))
        });

        self.snapshot = Some(snapshot);
        self.state.add_model_update(update);
        info!("Renumbered document");
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let snapshot = self
            .snapshot
            .take()
            .ok_or(UndoError::MissingUndoData(self.name()))?;
        let update = context.document.write(|doc| restore_snapshot(doc, snapshot));
        self.state.add_model_update(update);
        Ok(())
    }
}
