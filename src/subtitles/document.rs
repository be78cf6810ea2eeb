/*!
 * The scene → batch → line hierarchy and its structural operations.
 *
 * Every operation here either leaves the numbering invariant intact
 * (scenes numbered 1..N, batches 1..M within each scene, line numbers
 * strictly increasing across the document) or returns an error without
 * modifying the document. `renumber` additionally restores contiguous line
 * numbering from `start_line_number`.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::DocumentError;

use super::batch::{join_summaries, SubtitleBatch};
use super::line::SubtitleLine;
use super::scene::SubtitleScene;

/// Lines removed from one batch by `delete_lines`
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedLines {
    /// Scene the lines were removed from (numbering before deletion)
    pub scene: usize,
    /// Batch the lines were removed from (numbering before deletion)
    pub batch: usize,
    /// Removed source lines
    pub originals: Vec<SubtitleLine>,
    /// Removed translations
    pub translated: Vec<SubtitleLine>,
}

/// A subtitle document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleDocument {
    /// Scenes in line order
    pub scenes: Vec<SubtitleScene>,

    /// Number given to the first line by `renumber`
    #[serde(default = "default_start_line_number")]
    pub start_line_number: usize,
}

fn default_start_line_number() -> usize {
    1
}

impl Default for SubtitleDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SubtitleDocument {
    /// Create a document from scenes, taking the start number from the first line
    pub fn new(scenes: Vec<SubtitleScene>) -> Self {
        let start_line_number = scenes
            .iter()
            .find_map(|s| s.first_line_number())
            .unwrap_or_else(default_start_line_number);
        Self {
            scenes,
            start_line_number,
        }
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Number of source lines in the document
    pub fn line_count(&self) -> usize {
        self.scenes.iter().map(|s| s.line_count()).sum()
    }

    /// All batches in document order
    pub fn batches(&self) -> impl Iterator<Item = &SubtitleBatch> {
        self.scenes.iter().flat_map(|s| s.batches.iter())
    }

    /// All source lines in document order
    pub fn lines(&self) -> impl Iterator<Item = &SubtitleLine> {
        self.batches().flat_map(|b| b.originals.iter())
    }

    pub fn any_translated(&self) -> bool {
        self.scenes.iter().any(|s| s.any_translated())
    }

    pub fn all_translated(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(|s| s.all_translated())
    }

    pub fn get_scene(&self, number: usize) -> Result<&SubtitleScene, DocumentError> {
        number
            .checked_sub(1)
            .and_then(|i| self.scenes.get(i))
            .ok_or(DocumentError::SceneNotFound(number))
    }

    pub fn get_scene_mut(&mut self, number: usize) -> Result<&mut SubtitleScene, DocumentError> {
        number
            .checked_sub(1)
            .and_then(move |i| self.scenes.get_mut(i))
            .ok_or(DocumentError::SceneNotFound(number))
    }

    pub fn get_batch(&self, scene: usize, batch: usize) -> Result<&SubtitleBatch, DocumentError> {
        self.get_scene(scene)?
            .get_batch(batch)
            .ok_or(DocumentError::BatchNotFound { scene, batch })
    }

    pub fn get_batch_mut(
        &mut self,
        scene: usize,
        batch: usize,
    ) -> Result<&mut SubtitleBatch, DocumentError> {
        self.get_scene_mut(scene)?
            .get_batch_mut(batch)
            .ok_or(DocumentError::BatchNotFound { scene, batch })
    }

    /// Find the batch whose line range contains the line number
    pub fn get_batch_containing_line(&self, line_number: usize) -> Result<&SubtitleBatch, DocumentError> {
        self.batches()
            .find(|b| b.spans(line_number))
            .ok_or(DocumentError::LineNotFound(line_number))
    }

    pub fn get_line(&self, line_number: usize) -> Result<&SubtitleLine, DocumentError> {
        self.get_batch_containing_line(line_number)?
            .get_original(line_number)
            .ok_or(DocumentError::LineNotFound(line_number))
    }

    pub fn get_line_mut(&mut self, line_number: usize) -> Result<&mut SubtitleLine, DocumentError> {
        self.scenes
            .iter_mut()
            .flat_map(|s| s.batches.iter_mut())
            .find(|b| b.spans(line_number))
            .and_then(|b| b.get_original_mut(line_number))
            .ok_or(DocumentError::LineNotFound(line_number))
    }

    /// Merge a contiguous run of scenes into the first of them.
    ///
    /// Summaries are newline-joined, batches concatenated and renumbered,
    /// following scenes shift down.
    pub fn merge_scenes(&mut self, numbers: &[usize]) -> Result<(), DocumentError> {
        check_run("Scene", numbers)?;
        let last = numbers[numbers.len() - 1];
        if last > self.scenes.len() {
            return Err(DocumentError::SceneNotFound(last));
        }

        let first_index = numbers[0] - 1;
        let mut merged = self.scenes.drain(first_index..first_index + numbers.len());
        let Some(mut target) = merged.next() else {
            return Err(DocumentError::SceneNotFound(numbers[0]));
        };
        let mut summaries = vec![target.summary.take()];
        for scene in merged {
            target.batches.extend(scene.batches);
            summaries.push(scene.summary);
            for (key, value) in scene.context {
                target.context.entry(key).or_insert(value);
            }
        }
        target.summary = join_summaries(summaries);
        target.renumber_batches();
        self.scenes.insert(first_index, target);
        self.renumber_scenes();

        debug!("Merged scenes {:?} into scene {}", numbers, numbers[0]);
        self.debug_check();
        Ok(())
    }

    /// Merge a contiguous run of batches in a scene into the first of them
    pub fn merge_batches(&mut self, scene_number: usize, numbers: &[usize]) -> Result<(), DocumentError> {
        check_run("Batch", numbers)?;
        let scene = self.get_scene_mut(scene_number)?;
        let last = numbers[numbers.len() - 1];
        if last > scene.batches.len() {
            return Err(DocumentError::BatchNotFound {
                scene: scene_number,
                batch: last,
            });
        }

        let first_index = numbers[0] - 1;
        let mut merged = scene.batches.drain(first_index..first_index + numbers.len());
        let Some(mut target) = merged.next() else {
            return Err(DocumentError::BatchNotFound {
                scene: scene_number,
                batch: numbers[0],
            });
        };
        for batch in merged {
            target.append(batch);
        }
        scene.batches.insert(first_index, target);
        scene.renumber_batches();

        debug!("Merged batches {:?} in scene {}", numbers, scene_number);
        self.debug_check();
        Ok(())
    }

    /// Move a batch and all following batches of a scene into a new scene
    /// inserted immediately after it
    pub fn split_scene(&mut self, scene_number: usize, at_batch: usize) -> Result<(), DocumentError> {
        let scene = self.get_scene_mut(scene_number)?;
        if at_batch < 2 || at_batch > scene.batches.len() {
            return Err(DocumentError::InvalidSplit(format!(
                "scene {} cannot be split at batch {} (has {} batches)",
                scene_number,
                at_batch,
                scene.batches.len()
            )));
        }

        let tail = scene.batches.split_off(at_batch - 1);
        let new_scene = SubtitleScene::new(scene_number + 1, tail);
        self.scenes.insert(scene_number, new_scene);
        self.renumber_scenes();

        debug!("Split scene {} at batch {}", scene_number, at_batch);
        self.debug_check();
        Ok(())
    }

    /// Split a batch at a line number.
    ///
    /// The translations split at `at_translated_line` when given and present,
    /// otherwise at the first translation numbered at or after `at_line`.
    pub fn split_batch(
        &mut self,
        scene_number: usize,
        batch_number: usize,
        at_line: usize,
        at_translated_line: Option<usize>,
    ) -> Result<(), DocumentError> {
        let batch = self.get_batch_mut(scene_number, batch_number)?;

        let index = batch
            .originals
            .iter()
            .position(|line| line.number >= at_line)
            .filter(|&i| batch.originals[i].number == at_line)
            .ok_or_else(|| {
                DocumentError::InvalidSplit(format!(
                    "line {} is not in batch ({},{})",
                    at_line, scene_number, batch_number
                ))
            })?;
        if index == 0 {
            return Err(DocumentError::InvalidSplit(format!(
                "line {} is the first line of batch ({},{})",
                at_line, scene_number, batch_number
            )));
        }

        let split_number = at_translated_line.unwrap_or(at_line);
        let translated_index = match batch.translated.iter().position(|l| l.number == split_number) {
            Some(i) => i,
            None => {
                let i = batch.translated.partition_point(|l| l.number < at_line);
                if at_translated_line.is_some() && !batch.translated.is_empty() {
                    warn!(
                        "Translated line {} not found in batch ({},{}), translations from line {} onwards move to the new batch",
                        split_number, scene_number, batch_number, at_line
                    );
                }
                i
            }
        };

        let tail = batch.split_off(index, translated_index);
        let scene = self.get_scene_mut(scene_number)?;
        scene.batches.insert(batch_number, tail);
        scene.renumber_batches();

        debug!("Split batch ({},{}) at line {}", scene_number, batch_number, at_line);
        self.debug_check();
        Ok(())
    }

    /// Split a batch at the gap that best balances size and pause length.
    ///
    /// Candidates are indices in `[min_size, len - min_size)`, scored by
    /// proximity to the midpoint times the gap before the line. Returns the
    /// number of the first line of the new batch.
    pub fn auto_split_batch(
        &mut self,
        scene_number: usize,
        batch_number: usize,
        min_size: usize,
    ) -> Result<usize, DocumentError> {
        let batch = self.get_batch(scene_number, batch_number)?;
        let min_size = min_size.max(1);
        let len = batch.size();
        if len < min_size * 2 {
            return Err(DocumentError::BatchTooSmall {
                size: len,
                required: min_size * 2,
            });
        }

        let lines = &batch.originals;
        let midpoint = (len / 2) as i64;
        let mut best: Option<(usize, i64)> = None;
        for i in min_size..len - min_size {
            let gap = lines[i].gap_after(&lines[i - 1]) as i64;
            let proximity = midpoint - (i as i64 - midpoint).abs();
            let score = proximity * gap;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((index, _)) = best else {
            return Err(DocumentError::BatchTooSmall {
                size: len,
                required: min_size * 2 + 1,
            });
        };
        let split_line = lines[index].number;
        self.split_batch(scene_number, batch_number, split_line, None)?;
        Ok(split_line)
    }

    /// Renumber scenes, batches and lines sequentially.
    ///
    /// Translations follow their original's number.
    pub fn renumber(&mut self) {
        let mut next = self.start_line_number;
        let mut remap: HashMap<usize, usize> = HashMap::new();

        for (scene_index, scene) in self.scenes.iter_mut().enumerate() {
            scene.set_number(scene_index + 1);
            for line in scene.batches.iter_mut().flat_map(|b| b.originals.iter_mut()) {
                remap.insert(line.number, next);
                line.number = next;
                next += 1;
            }
        }

        for batch in self.scenes.iter_mut().flat_map(|s| s.batches.iter_mut()) {
            for line in &mut batch.translated {
                match remap.get(&line.number) {
                    Some(&number) => line.number = number,
                    None => warn!(
                        "Translated line {} in batch ({},{}) has no original to follow",
                        line.number, batch.scene, batch.number
                    ),
                }
            }
            batch.translated.sort_by_key(|l| l.number);
        }

        debug!("Renumbered {} lines from {}", next - self.start_line_number, self.start_line_number);
        self.debug_check();
    }

    /// Remove lines by number.
    ///
    /// Batches and scenes left empty are removed and the remaining scenes
    /// and batches renumbered. Line numbers keep their gaps.
    pub fn delete_lines(&mut self, numbers: &[usize]) -> Result<Vec<DeletedLines>, DocumentError> {
        for &number in numbers {
            self.get_line(number)?;
        }
        let to_delete: HashSet<usize> = numbers.iter().copied().collect();

        let mut deleted = Vec::new();
        for scene in &mut self.scenes {
            for batch in &mut scene.batches {
                if !batch.originals.iter().any(|l| to_delete.contains(&l.number)) {
                    continue;
                }
                let (originals, translated) = batch.delete_lines(&to_delete);
                deleted.push(DeletedLines {
                    scene: batch.scene,
                    batch: batch.number,
                    originals,
                    translated,
                });
            }
            scene.batches.retain(|b| !b.is_empty());
            scene.renumber_batches();
        }
        self.scenes.retain(|s| !s.batches.is_empty());
        self.renumber_scenes();

        debug!("Deleted {} lines", to_delete.len());
        self.debug_check();
        Ok(deleted)
    }

    /// Insert lines into the batches their numbers fall into.
    ///
    /// A line between two batches joins the earlier one; a line before the
    /// first batch joins the first.
    pub fn insert_lines(
        &mut self,
        originals: Vec<SubtitleLine>,
        translated: Vec<SubtitleLine>,
    ) -> Result<(), DocumentError> {
        if self.scenes.is_empty() {
            return Err(DocumentError::Empty);
        }
        let mut seen = HashSet::new();
        for line in &originals {
            if !seen.insert(line.number) || self.get_line(line.number).is_ok() {
                return Err(DocumentError::DuplicateLine(line.number));
            }
        }

        let mut grouped: HashMap<(usize, usize), (Vec<SubtitleLine>, Vec<SubtitleLine>)> = HashMap::new();
        for line in originals {
            let key = self.insert_position(line.number)?;
            grouped.entry(key).or_default().0.push(line);
        }
        for line in translated {
            let key = self.insert_position(line.number)?;
            grouped.entry(key).or_default().1.push(line);
        }

        for ((scene_index, batch_index), (originals, translated)) in grouped {
            self.scenes[scene_index].batches[batch_index].insert_lines(originals, translated)?;
        }

        self.debug_check();
        Ok(())
    }

    /// Scene and batch numbers of the batch `insert_lines` would put this line number in
    pub fn insert_target(&self, number: usize) -> Result<(usize, usize), DocumentError> {
        let (scene_index, batch_index) = self.insert_position(number)?;
        let batch = &self.scenes[scene_index].batches[batch_index];
        Ok((batch.scene, batch.number))
    }

    /// Replace the scene list wholesale
    pub fn restore_scenes(&mut self, scenes: Vec<SubtitleScene>) {
        self.scenes = scenes;
    }

    /// Check scene, batch and line numbering
    pub fn check_numbering(&self) -> Result<(), DocumentError> {
        let mut previous: Option<usize> = None;
        for (scene_index, scene) in self.scenes.iter().enumerate() {
            if scene.number != scene_index + 1 {
                return Err(DocumentError::NumberingViolation(format!(
                    "scene at position {} is numbered {}",
                    scene_index + 1,
                    scene.number
                )));
            }
            for (batch_index, batch) in scene.batches.iter().enumerate() {
                if batch.number != batch_index + 1 || batch.scene != scene.number {
                    return Err(DocumentError::NumberingViolation(format!(
                        "batch at position ({},{}) is numbered ({},{})",
                        scene.number,
                        batch_index + 1,
                        batch.scene,
                        batch.number
                    )));
                }
                for line in &batch.originals {
                    if previous.is_some_and(|p| line.number <= p) {
                        return Err(DocumentError::NumberingViolation(format!(
                            "line {} follows line {}",
                            line.number,
                            previous.unwrap_or_default()
                        )));
                    }
                    previous = Some(line.number);
                }
            }
        }
        Ok(())
    }

    /// Check numbering and that lines run contiguously from `start_line_number`
    pub fn check_contiguous(&self) -> Result<(), DocumentError> {
        self.check_numbering()?;
        for (offset, line) in self.lines().enumerate() {
            let expected = self.start_line_number + offset;
            if line.number != expected {
                return Err(DocumentError::NumberingViolation(format!(
                    "expected line {} but found {}",
                    expected, line.number
                )));
            }
        }
        Ok(())
    }

    fn renumber_scenes(&mut self) {
        for (index, scene) in self.scenes.iter_mut().enumerate() {
            scene.set_number(index + 1);
        }
    }

    /// Indices of the batch a new line with this number belongs to
    fn insert_position(&self, number: usize) -> Result<(usize, usize), DocumentError> {
        let mut position = None;
        for (scene_index, scene) in self.scenes.iter().enumerate() {
            for (batch_index, batch) in scene.batches.iter().enumerate() {
                if batch.first_line_number().is_some_and(|first| first > number) {
                    return Ok(position.unwrap_or((scene_index, batch_index)));
                }
                position = Some((scene_index, batch_index));
            }
        }
        position.ok_or(DocumentError::Empty)
    }

    fn debug_check(&self) {
        debug_assert!(
            self.check_numbering().is_ok(),
            "numbering invariant broken: {:?}",
            self.check_numbering()
        );
    }
}

/// Check that numbers are a non-empty, sorted, contiguous run starting at 1 or above
fn check_run(what: &'static str, numbers: &[usize]) -> Result<(), DocumentError> {
    let contiguous = !numbers.is_empty()
        && numbers[0] >= 1
        && numbers.windows(2).all(|pair| pair[1] == pair[0] + 1);
    if contiguous {
        Ok(())
    } else {
        Err(DocumentError::NonContiguous {
            what,
            numbers: numbers.to_vec(),
        })
    }
}
