/*!
 * Translation commands.
 *
 * `TranslateSceneCommand` sends each batch of a scene to the backend, one
 * request per batch. The request is awaited without holding the document
 * lock; only applying the parsed result locks the document.
 */

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::errors::{CommandError, DocumentError, TranslationError, UndoError, ValidationError};
use crate::model_update::{BatchKey, BatchUpdate, LineUpdate, ModelUpdate, SceneUpdate};
use crate::subtitles::{SubtitleBatch, SubtitleDocument, SubtitleLine};
use crate::translation::{ParseResult, TranslationParser, TranslationPrompt, TranslationPromptBuilder};
use crate::validation::BatchValidator;

use super::{Command, CommandContext, CommandState};

/// Translation-related contents of one batch
#[derive(Debug, Clone, PartialEq)]
struct BatchState {
    key: BatchKey,
    originals: Vec<SubtitleLine>,
    translated: Vec<SubtitleLine>,
    summary: Option<String>,
    errors: Vec<ValidationError>,
    response: Option<String>,
    fuzzy_matches: Vec<usize>,
}

impl BatchState {
    fn capture(batch: &SubtitleBatch) -> Self {
        Self {
            key: (batch.scene, batch.number),
            originals: batch.originals.clone(),
            translated: batch.translated.clone(),
            summary: batch.summary.clone(),
            errors: batch.errors.clone(),
            response: batch.response.clone(),
            fuzzy_matches: batch.fuzzy_matches.clone(),
        }
    }

    fn restore(&self, doc: &mut SubtitleDocument) -> Result<ModelUpdate, DocumentError> {
        let (scene, number) = self.key;
        let batch = doc.get_batch_mut(scene, number)?;
        batch.originals = self.originals.clone();
        batch.translated = self.translated.clone();
        batch.summary = self.summary.clone();
        batch.errors = self.errors.clone();
        batch.response = self.response.clone();
        batch.fuzzy_matches = self.fuzzy_matches.clone();

        let mut update = ModelUpdate::new();
        update.batches.replace(self.key, batch.clone());
        Ok(update)
    }
}

/// Store a parse result on a batch and describe the change
fn apply_result(
    batch: &mut SubtitleBatch,
    result: &ParseResult,
    response: &str,
    validator: &BatchValidator,
) -> ModelUpdate {
    batch.clear_translations();
    batch.set_translations(result.translated.clone());
    batch.response = Some(response.to_string());
    batch.fuzzy_matches = result.fuzzy_matches.clone();
    batch.fuzzy_matches.sort_unstable();
    if !batch.fuzzy_matches.is_empty() {
        warn!(
            "Batch ({},{}) lines {:?} were matched by content",
            batch.scene, batch.number, batch.fuzzy_matches
        );
    }
    if let Some(summary) = &result.summary {
        batch.summary = Some(summary.clone());
    }
    batch.errors = validator.validate_batch(batch);

    let key = (batch.scene, batch.number);
    let mut update = ModelUpdate::new();
    update.batches.update(
        key,
        BatchUpdate {
            summary: Some(batch.summary.clone()),
            errors: Some(batch.errors.clone()),
            response: Some(batch.response.clone()),
            fuzzy_matches: Some(batch.fuzzy_matches.clone()),
            ..BatchUpdate::default()
        },
    );
    for line in &batch.originals {
        update.lines.update(
            (key.0, key.1, line.number),
            LineUpdate {
                translation: Some(line.translation.clone()),
                ..LineUpdate::default()
            },
        );
    }
    update
}

/// Translate every batch in a scene
#[derive(Debug)]
pub struct TranslateSceneCommand {
    scene: usize,
    before: Vec<BatchState>,
    after: Vec<BatchState>,
    scene_summary: Option<(Option<String>, Option<String>)>,
    state: CommandState,
}

impl TranslateSceneCommand {
    pub fn new(scene: usize) -> Self {
        Self {
            scene,
            before: Vec::new(),
            after: Vec::new(),
            scene_summary: None,
            state: CommandState::non_blocking(),
        }
    }

    pub fn scene(&self) -> usize {
        self.scene
    }

    fn build_prompt(
        &self,
        context: &CommandContext,
        doc: &SubtitleDocument,
        batch_number: usize,
        previous_summaries: &[String],
    ) -> Result<(TranslationPrompt, BatchState), DocumentError> {
        let settings = &context.config.translation;
        let scene = doc.get_scene(self.scene)?;
        let batch = doc.get_batch(self.scene, batch_number)?;

        let mut builder = TranslationPromptBuilder::new(&settings.source_language, &settings.target_language);
        if !settings.instructions.trim().is_empty() {
            builder = builder.with_instructions(&settings.instructions);
        }
        let prompt = builder
            .with_scene_summary(scene.summary.as_deref())
            .with_batch_summaries(previous_summaries.iter().cloned())
            .with_max_summaries(settings.max_context_summaries)
            .with_context(&batch.context)
            .with_lines(&batch.originals)
            .build();
        Ok((prompt, BatchState::capture(batch)))
    }

    /// Re-apply the recorded results without calling the backend
    fn reapply(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let scene_summary = self.scene_summary.as_ref().map(|(_, after)| after.clone());
        let updates = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let mut updates = Vec::new();
                for state in &self.after {
                    updates.push(state.restore(doc)?);
                }
                if let Some(summary) = scene_summary {
                    updates.push(set_scene_summary(doc, self.scene, summary)?);
                }
                Ok(updates)
            })
            .map_err(|source| CommandError::document(self.name(), source))?;

        for update in updates {
            self.state.add_model_update(update);
        }
        Ok(())
    }
}

fn set_scene_summary(
    doc: &mut SubtitleDocument,
    number: usize,
    summary: Option<String>,
) -> Result<ModelUpdate, DocumentError> {
    doc.get_scene_mut(number)?.summary = summary.clone();
    let mut update = ModelUpdate::new();
    update.scenes.update(
        number,
        SceneUpdate {
            summary: Some(summary),
            context: None,
        },
    );
    Ok(update)
}

#[async_trait]
impl Command for TranslateSceneCommand {
    fn name(&self) -> &'static str {
        "TranslateSceneCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        if !self.after.is_empty() {
            return self.reapply(context);
        }

        let backend = context.backend.clone().ok_or_else(|| CommandError::Failed {
            command: self.name(),
            message: "No translation backend configured".to_string(),
        })?;
        let parser = TranslationParser::new(context.config.parser.clone());
        let validator = BatchValidator::new(context.config.parser.clone());

        let batch_count = context
            .document
            .read(|doc| doc.get_scene(self.scene).map(|scene| scene.size()))
            .map_err(|source| CommandError::document(self.name(), source))?;
        info!("Translating scene {} ({} batches) with {}", self.scene, batch_count, backend.name());

        let mut previous_summaries: Vec<String> = Vec::new();
        let mut translated_any = false;

        for batch_number in 1..=batch_count {
            self.check_aborted()?;

            let (prompt, before) = context
                .document
                .read(|doc| self.build_prompt(context, doc, batch_number, &previous_summaries))
                .map_err(|source| CommandError::document(self.name(), source))?;

            let response = backend
                .translate(&prompt)
                .await
                .map_err(|error| CommandError::translation(self.name(), TranslationError::from(error)))?;

            if self.state.is_aborted() {
                info!("Discarding response for batch ({},{}) after abort", self.scene, batch_number);
                return Err(CommandError::Aborted { command: self.name() });
            }

            let result = parser.parse(&response, &prompt.lines);
            translated_any |= result.has_translations();
            debug!(
                "Batch ({},{}): {} of {} lines translated",
                self.scene,
                batch_number,
                prompt.lines.len() - result.unmatched.len(),
                prompt.lines.len()
            );

            let scene = self.scene;
            let (after, update, summaries) = context
                .document
                .write(|doc| -> Result<_, DocumentError> {
                    let batch = doc.get_batch_mut(scene, batch_number)?;
                    let mut update = apply_result(batch, &result, &response, &validator);
                    let after = BatchState::capture(batch);

                    let mut summaries = None;
                    if let Some(summary) = &result.scene_summary {
                        let scene_ref = doc.get_scene_mut(scene)?;
                        summaries = Some((scene_ref.summary.clone(), Some(summary.clone())));
                        scene_ref.summary = Some(summary.clone());
                        update.scenes.update(
                            scene,
                            SceneUpdate {
                                summary: Some(Some(summary.clone())),
                                context: None,
                            },
                        );
                    }
                    Ok((after, update, summaries))
                })
                .map_err(|source| CommandError::document(self.name(), source))?;

            if let Some((old, new)) = summaries {
                let old = self.scene_summary.take().map_or(old, |(first, _)| first);
                self.scene_summary = Some((old, new));
            }
            if let Some(summary) = &after.summary {
                previous_summaries.push(summary.clone());
            }
            if !after.errors.is_empty() {
                warn!("Batch ({},{}) translated with errors: {:?}", self.scene, batch_number, after.errors);
            }

            self.before.push(before);
            self.after.push(after);
            self.state.add_model_update(update);
        }

        if batch_count > 0 && !translated_any {
            return Err(CommandError::translation(self.name(), TranslationError::NoTranslation));
        }
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        if self.before.is_empty() {
            return Err(UndoError::MissingUndoData(self.name()));
        }

        let scene_summary = self.scene_summary.as_ref().map(|(before, _)| before.clone());
        let updates = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let mut updates = Vec::new();
                for state in self.before.iter().rev() {
                    updates.push(state.restore(doc)?);
                }
                if let Some(summary) = scene_summary {
                    updates.push(set_scene_summary(doc, self.scene, summary)?);
                }
                Ok(updates)
            })
            .map_err(|source| UndoError::Document {
                command: self.name(),
                source,
            })?;

        for update in updates {
            self.state.add_model_update(update);
        }
        Ok(())
    }
}

/// Queue a `TranslateSceneCommand` for each scene that still needs one
#[derive(Debug)]
pub struct StartTranslationCommand {
    scenes: Option<Vec<usize>>,
    state: CommandState,
}

impl Default for StartTranslationCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl StartTranslationCommand {
    pub fn new() -> Self {
        Self {
            scenes: None,
            state: CommandState::new().with_skip_undo(true),
        }
    }

    /// Only consider these scenes
    pub fn with_scenes(mut self, scenes: Vec<usize>) -> Self {
        self.scenes = Some(scenes);
        self
    }
}

#[async_trait]
impl Command for StartTranslationCommand {
    fn name(&self) -> &'static str {
        "StartTranslationCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        if context.backend.is_none() {
            return Err(CommandError::Failed {
                command: self.name(),
                message: "No translation backend configured".to_string(),
            });
        }

        let scenes: Vec<usize> = context.document.read(|doc| {
            doc.scenes
                .iter()
                .filter(|scene| self.scenes.as_ref().is_none_or(|wanted| wanted.contains(&scene.number)))
                .filter(|scene| !scene.all_translated())
                .map(|scene| scene.number)
                .collect()
        });

        if scenes.is_empty() {
            info!("Nothing left to translate");
        } else {
            info!("Queueing translation of {} scenes", scenes.len());
        }
        for scene in scenes {
            self.state.add_follow_on(Box::new(TranslateSceneCommand::new(scene)));
        }
        Ok(())
    }

    fn undo(&mut self, _context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()
    }
}

/// Parse each batch's stored response again
#[derive(Debug)]
pub struct ReparseBatchesCommand {
    batches: Vec<BatchKey>,
    before: Vec<BatchState>,
    state: CommandState,
}

impl ReparseBatchesCommand {
    pub fn new(batches: Vec<BatchKey>) -> Self {
        Self {
            batches,
            before: Vec::new(),
            state: CommandState::new(),
        }
    }
}

#[async_trait]
impl Command for ReparseBatchesCommand {
    fn name(&self) -> &'static str {
        "ReparseBatchesCommand"
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CommandState {
        &mut self.state
    }

    async fn execute(&mut self, context: &CommandContext) -> Result<(), CommandError> {
        let parser = TranslationParser::new(context.config.parser.clone());
        let validator = BatchValidator::new(context.config.parser.clone());
        let keys = &self.batches;

        let (before, updates) = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                let mut before = Vec::new();
                let mut updates = Vec::new();
                for &(scene, number) in keys {
                    let batch = doc.get_batch_mut(scene, number)?;
                    let Some(response) = batch.response.clone() else {
                        warn!("Batch ({},{}) has no response to reparse", scene, number);
                        continue;
                    };
                    before.push(BatchState::capture(batch));
                    let result = parser.parse(&response, &batch.originals);
                    updates.push(apply_result(batch, &result, &response, &validator));
                }
                Ok((before, updates))
            })
            .map_err(|source| CommandError::document(self.name(), source))?;

        debug!("Reparsed {} batches", before.len());
        self.before = before;
        for update in updates {
            self.state.add_model_update(update);
        }
        Ok(())
    }

    fn undo(&mut self, context: &CommandContext) -> Result<(), UndoError> {
        self.check_undo()?;
        let before = std::mem::take(&mut self.before);
        let updates = context
            .document
            .write(|doc| -> Result<_, DocumentError> {
                before.iter().rev().map(|state| state.restore(doc)).collect::<Result<Vec<_>, _>>()
            })
            .map_err(|source| UndoError::Document {
                command: self.name(),
                source,
            })?;

        for update in updates {
            self.state.add_model_update(update);
        }
        Ok(())
    }
}
