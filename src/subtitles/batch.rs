/*!
 * Batches: contiguous runs of lines translated in a single request.
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::errors::{DocumentError, ValidationError};

use super::line::SubtitleLine;

/// A contiguous run of subtitle lines grouped for single-pass translation.
///
/// `originals` is sorted by number. `translated` holds separate line
/// instances linked to originals by number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleBatch {
    /// Number of the scene that owns this batch
    pub scene: usize,

    /// 1-based position within the scene
    pub number: usize,

    /// Source lines
    pub originals: Vec<SubtitleLine>,

    /// Translated lines
    #[serde(default)]
    pub translated: Vec<SubtitleLine>,

    /// Summary of the batch content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Free-form context passed to translation requests
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    /// Validation faults from the last translation
    #[serde(default)]
    pub errors: Vec<ValidationError>,

    /// Raw backend response from the last translation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Lines whose translation was matched by content because the response
    /// numbered them differently
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fuzzy_matches: Vec<usize>,
}

impl SubtitleBatch {
    /// Create a batch from source lines
    pub fn new(scene: usize, number: usize, originals: Vec<SubtitleLine>) -> Self {
        Self {
            scene,
            number,
            originals,
            translated: Vec::new(),
            summary: None,
            context: BTreeMap::new(),
            errors: Vec::new(),
            response: None,
            fuzzy_matches: Vec::new(),
        }
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    /// Number of source lines
    pub fn size(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn first_line_number(&self) -> Option<usize> {
        self.originals.first().map(|line| line.number)
    }

    pub fn last_line_number(&self) -> Option<usize> {
        self.originals.last().map(|line| line.number)
    }

    /// Whether a line number falls inside this batch's range
    pub fn spans(&self, number: usize) -> bool {
        match (self.first_line_number(), self.last_line_number()) {
            (Some(first), Some(last)) => first <= number && number <= last,
            _ => false,
        }
    }

    pub fn get_original(&self, number: usize) -> Option<&SubtitleLine> {
        self.originals.iter().find(|line| line.number == number)
    }

    pub fn get_original_mut(&mut self, number: usize) -> Option<&mut SubtitleLine> {
        self.originals.iter_mut().find(|line| line.number == number)
    }

    pub fn get_translated(&self, number: usize) -> Option<&SubtitleLine> {
        self.translated.iter().find(|line| line.number == number)
    }

    /// Whether any line has been translated
    pub fn any_translated(&self) -> bool {
        !self.translated.is_empty()
    }

    /// Whether every source line has a translation
    pub fn all_translated(&self) -> bool {
        !self.originals.is_empty()
            && self
                .originals
                .iter()
                .all(|line| self.get_translated(line.number).is_some())
    }

    /// Numbers of translated lines with no matching original
    pub fn orphaned_translations(&self) -> Vec<usize> {
        let numbers: HashSet<usize> = self.originals.iter().map(|line| line.number).collect();
        self.translated
            .iter()
            .filter(|line| !numbers.contains(&line.number))
            .map(|line| line.number)
            .collect()
    }

    /// Merge translated lines into the batch, replacing any with the same number.
    ///
    /// The `translation` field of matching originals is updated too.
    pub fn set_translations(&mut self, lines: Vec<SubtitleLine>) {
        for line in lines {
            if let Some(original) = self.get_original_mut(line.number) {
                original.translation = Some(line.text.clone());
            }
            match self.translated.binary_search_by_key(&line.number, |l| l.number) {
                Ok(index) => self.translated[index] = line,
                Err(index) => self.translated.insert(index, line),
            }
        }
    }

    /// Remove all translations
    pub fn clear_translations(&mut self) {
        self.translated.clear();
        self.fuzzy_matches.clear();
        for line in &mut self.originals {
            line.translation = None;
        }
    }

    /// Insert lines at the position given by their numbers
    pub fn insert_lines(
        &mut self,
        originals: Vec<SubtitleLine>,
        translated: Vec<SubtitleLine>,
    ) -> Result<(), DocumentError> {
        for line in &originals {
            if self.get_original(line.number).is_some() {
                return Err(DocumentError::DuplicateLine(line.number));
            }
        }
        for line in originals {
            let index = self.originals.partition_point(|l| l.number < line.number);
            self.originals.insert(index, line);
        }
        self.set_translations(translated);
        Ok(())
    }

    /// Remove lines by number, returning the removed originals and translations
    pub fn delete_lines(&mut self, numbers: &HashSet<usize>) -> (Vec<SubtitleLine>, Vec<SubtitleLine>) {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.originals)
            .into_iter()
            .partition(|line| numbers.contains(&line.number));
        self.originals = kept;

        let (removed_translated, kept_translated): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.translated)
                .into_iter()
                .partition(|line| numbers.contains(&line.number));
        self.translated = kept_translated;
        self.fuzzy_matches.retain(|number| !numbers.contains(number));

        (removed, removed_translated)
    }

    /// Split off the lines from the given indices into a new batch.
    ///
    /// The tail takes no summary, context or errors.
    pub fn split_off(&mut self, original_index: usize, translated_index: usize) -> SubtitleBatch {
        let mut tail = SubtitleBatch::new(self.scene, self.number + 1, self.originals.split_off(original_index));
        tail.translated = self.translated.split_off(translated_index.min(self.translated.len()));
        let (moved, kept): (Vec<usize>, Vec<usize>) =
            std::mem::take(&mut self.fuzzy_matches).into_iter().partition(|&n| tail.spans(n));
        self.fuzzy_matches = kept;
        tail.fuzzy_matches = moved;
        tail
    }

    /// Append another batch's lines and summary to this one
    pub fn append(&mut self, other: SubtitleBatch) {
        self.originals.extend(other.originals);
        self.translated.extend(other.translated);
        self.summary = join_summaries([self.summary.take(), other.summary]);
        for (key, value) in other.context {
            self.context.entry(key).or_insert(value);
        }
        self.errors.extend(other.errors);
        self.fuzzy_matches.extend(other.fuzzy_matches);
    }
}

/// Newline-join summaries, skipping empty ones
pub fn join_summaries<I>(summaries: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let parts: Vec<String> = summaries
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}
