/*!
 * Scenes: top-level groups of batches separated by a time gap.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::batch::SubtitleBatch;
use super::line::SubtitleLine;

/// A scene and its batches. `batches[i].number == i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleScene {
    /// 1-based position within the document
    pub number: usize,

    /// Batches in line order
    pub batches: Vec<SubtitleBatch>,

    /// Summary of the scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Free-form context passed to translation requests
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl SubtitleScene {
    /// Create a scene from batches, renumbering them
    pub fn new(number: usize, batches: Vec<SubtitleBatch>) -> Self {
        let mut scene = Self {
            number,
            batches,
            summary: None,
            context: BTreeMap::new(),
        };
        scene.renumber_batches();
        scene
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn size(&self) -> usize {
        self.batches.len()
    }

    /// Number of source lines across all batches
    pub fn line_count(&self) -> usize {
        self.batches.iter().map(|b| b.size()).sum()
    }

    pub fn first_line_number(&self) -> Option<usize> {
        self.batches.iter().find_map(|b| b.first_line_number())
    }

    pub fn last_line_number(&self) -> Option<usize> {
        self.batches.iter().rev().find_map(|b| b.last_line_number())
    }

    pub fn get_batch(&self, number: usize) -> Option<&SubtitleBatch> {
        number.checked_sub(1).and_then(|i| self.batches.get(i))
    }

    pub fn get_batch_mut(&mut self, number: usize) -> Option<&mut SubtitleBatch> {
        number.checked_sub(1).and_then(move |i| self.batches.get_mut(i))
    }

    /// All source lines in order
    pub fn lines(&self) -> impl Iterator<Item = &SubtitleLine> {
        self.batches.iter().flat_map(|b| b.originals.iter())
    }

    pub fn any_translated(&self) -> bool {
        self.batches.iter().any(|b| b.any_translated())
    }

    pub fn all_translated(&self) -> bool {
        self.batches.iter().all(|b| b.all_translated())
    }

    /// Assign batch numbers 1..M and point every batch at this scene
    pub fn renumber_batches(&mut self) {
        let scene_number = self.number;
        for (index, batch) in self.batches.iter_mut().enumerate() {
            batch.number = index + 1;
            batch.scene = scene_number;
        }
    }

    /// Change the scene number and update the batches to match
    pub fn set_number(&mut self, number: usize) {
        self.number = number;
        self.renumber_batches();
    }
}
