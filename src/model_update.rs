/*!
 * Structural diffs describing what a command changed.
 *
 * A `ModelUpdate` has one section per level of the hierarchy, keyed by scene
 * number, `(scene, batch)` or `(scene, batch, line)`. Each section records
 * additions, partial updates, removals and whole-item replacements. A view
 * applies an update with `ModelUpdate::apply`, which fixes the order so
 * that earlier operations never invalidate the keys of later ones:
 *
 * - scenes, then batches, then lines
 * - within a level: replacements, updates, removals in reverse key order,
 *   then additions
 * - line operations are grouped by owning batch
 */

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::ValidationError;
use crate::subtitles::{SubtitleBatch, SubtitleDocument, SubtitleLine, SubtitleScene};

/// Key of a batch: `(scene, batch)`
pub type BatchKey = (usize, usize);

/// Key of a line: `(scene, batch, line number)`
pub type LineKey = (usize, usize, usize);

/// Changes at one level of the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpdateSection<K: Ord, T, P> {
    pub additions: BTreeMap<K, T>,
    pub updates: BTreeMap<K, P>,
    pub removals: BTreeSet<K>,
    pub replacements: BTreeMap<K, T>,
}

impl<K: Ord, T, P> Default for ModelUpdateSection<K, T, P> {
    fn default() -> Self {
        Self {
            additions: BTreeMap::new(),
            updates: BTreeMap::new(),
            removals: BTreeSet::new(),
            replacements: BTreeMap::new(),
        }
    }
}

impl<K: Ord, T, P> ModelUpdateSection<K, T, P> {
    pub fn add(&mut self, key: K, item: T) {
        self.additions.insert(key, item);
    }

    pub fn update(&mut self, key: K, partial: P) {
        self.updates.insert(key, partial);
    }

    pub fn remove(&mut self, key: K) {
        self.removals.insert(key);
    }

    pub fn replace(&mut self, key: K, item: T) {
        self.replacements.insert(key, item);
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty()
            && self.updates.is_empty()
            && self.removals.is_empty()
            && self.replacements.is_empty()
    }

    /// Total number of operations
    pub fn len(&self) -> usize {
        self.additions.len() + self.updates.len() + self.removals.len() + self.replacements.len()
    }
}

/// Partial update of a scene. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneUpdate {
    pub summary: Option<Option<String>>,
    pub context: Option<BTreeMap<String, String>>,
}

/// Partial update of a batch. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchUpdate {
    pub summary: Option<Option<String>>,
    pub context: Option<BTreeMap<String, String>>,
    pub errors: Option<Vec<ValidationError>>,
    pub response: Option<Option<String>>,
    pub fuzzy_matches: Option<Vec<usize>>,
}

/// Partial update of a line. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineUpdate {
    pub text: Option<String>,
    pub translation: Option<Option<String>>,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

/// Consumer of model updates, typically a view mirroring the document
pub trait ModelUpdateView {
    fn replace_scene(&mut self, scene: usize, item: &SubtitleScene);
    fn update_scene(&mut self, scene: usize, update: &SceneUpdate);
    fn remove_scene(&mut self, scene: usize);
    fn add_scene(&mut self, scene: usize, item: &SubtitleScene);

    fn replace_batch(&mut self, key: BatchKey, item: &SubtitleBatch);
    fn update_batch(&mut self, key: BatchKey, update: &BatchUpdate);
    fn remove_batch(&mut self, key: BatchKey);
    fn add_batch(&mut self, key: BatchKey, item: &SubtitleBatch);

    /// Called before the line operations of one batch
    fn begin_lines(&mut self, _batch: BatchKey) {}

    fn replace_line(&mut self, key: LineKey, item: &SubtitleLine);
    fn update_line(&mut self, key: LineKey, update: &LineUpdate);
    fn remove_line(&mut self, key: LineKey);
    fn add_line(&mut self, key: LineKey, item: &SubtitleLine);

    /// Called after the line operations of one batch
    fn end_lines(&mut self, _batch: BatchKey) {}
}

/// A structural diff produced by a command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelUpdate {
    pub scenes: ModelUpdateSection<usize, SubtitleScene, SceneUpdate>,
    pub batches: ModelUpdateSection<BatchKey, SubtitleBatch, BatchUpdate>,
    pub lines: ModelUpdateSection<LineKey, SubtitleLine, LineUpdate>,
}

impl ModelUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty() && self.batches.is_empty() && self.lines.is_empty()
    }

    /// Describe a change to every scene from `first` onwards.
    ///
    /// Scenes `first..` of `document` are replaced, scenes beyond the new
    /// count are removed when the document shrank from `previous_count`, and
    /// added when it grew.
    pub fn scenes_from(document: &SubtitleDocument, first: usize, previous_count: usize) -> Self {
        let mut update = Self::new();
        let first = first.max(1);
        let count = document.scene_count();
        for scene in document.scenes.iter().filter(|s| s.number >= first) {
            if scene.number <= previous_count {
                update.scenes.replace(scene.number, scene.clone());
            } else {
                update.scenes.add(scene.number, scene.clone());
            }
        }
        for number in (count + 1).max(first)..=previous_count {
            update.scenes.remove(number);
        }
        update
    }

    /// Describe a change to every batch of a scene from `first` onwards
    pub fn batches_from(scene: &SubtitleScene, first: usize, previous_count: usize) -> Self {
        let mut update = Self::new();
        let first = first.max(1);
        for batch in scene.batches.iter().filter(|b| b.number >= first) {
            let key = (scene.number, batch.number);
            if batch.number <= previous_count {
                update.batches.replace(key, batch.clone());
            } else {
                update.batches.add(key, batch.clone());
            }
        }
        for number in (scene.size() + 1).max(first)..=previous_count {
            update.batches.remove((scene.number, number));
        }
        update
    }

    /// Apply the update to a view in key-safe order
    pub fn apply(&self, view: &mut dyn ModelUpdateView) {
        for (&key, item) in &self.scenes.replacements {
            view.replace_scene(key, item);
        }
        for (&key, update) in &self.scenes.updates {
            view.update_scene(key, update);
        }
        for &key in self.scenes.removals.iter().rev() {
            view.remove_scene(key);
        }
        for (&key, item) in &self.scenes.additions {
            view.add_scene(key, item);
        }

        for (&key, item) in &self.batches.replacements {
            view.replace_batch(key, item);
        }
        for (&key, update) in &self.batches.updates {
            view.update_batch(key, update);
        }
        for &key in self.batches.removals.iter().rev() {
            view.remove_batch(key);
        }
        for (&key, item) in &self.batches.additions {
            view.add_batch(key, item);
        }

        for batch in self.line_batches() {
            view.begin_lines(batch);
            for (&key, item) in self.lines.replacements.iter().filter(|(k, _)| in_batch(k, batch)) {
                view.replace_line(key, item);
            }
            for (&key, update) in self.lines.updates.iter().filter(|(k, _)| in_batch(k, batch)) {
                view.update_line(key, update);
            }
            for &key in self.lines.removals.iter().rev().filter(|k| in_batch(k, batch)) {
                view.remove_line(key);
            }
            for (&key, item) in self.lines.additions.iter().filter(|(k, _)| in_batch(k, batch)) {
                view.add_line(key, item);
            }
            view.end_lines(batch);
        }
    }

    /// Batches that own at least one line operation, in key order
    fn line_batches(&self) -> BTreeSet<BatchKey> {
        self.lines
            .replacements
            .keys()
            .chain(self.lines.updates.keys())
            .chain(self.lines.removals.iter())
            .chain(self.lines.additions.keys())
            .map(|&(scene, batch, _)| (scene, batch))
            .collect()
    }
}

fn in_batch(key: &LineKey, batch: BatchKey) -> bool {
    (key.0, key.1) == batch
}
