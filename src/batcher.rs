/*!
 * Scene and batch detection for a flat line sequence.
 *
 * Scenes are separated by pauses longer than the scene threshold. Scenes
 * with more lines than the maximum batch size are split recursively at the
 * largest pause that leaves both halves at least the minimum batch size.
 */

use log::debug;

use crate::app_config::BatcherConfig;
use crate::subtitles::{SubtitleBatch, SubtitleLine, SubtitleScene};

/// Overlapping lines are moved to start this long after the previous line ends
const OVERLAP_OFFSET_MS: u64 = 10;

/// Batcher that partitions time-ordered lines into scenes and batches.
#[derive(Debug, Clone)]
pub struct SubtitleBatcher {
    config: BatcherConfig,
}

impl SubtitleBatcher {
    /// Create a new batcher with the given configuration.
    pub fn new(config: BatcherConfig) -> Self {
        Self { config }
    }

    /// Create a batcher with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(BatcherConfig::default())
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Partition lines into scenes of batches.
    ///
    /// Lines that start before the previous line ends are clamped to start
    /// just after it.
    pub fn batch_subtitles(&self, lines: &[SubtitleLine]) -> Vec<SubtitleScene> {
        let mut scenes = Vec::new();
        let mut current: Vec<SubtitleLine> = Vec::new();
        let mut last_end: Option<u64> = None;

        for line in lines {
            let mut line = line.clone();
            if let Some(last_end) = last_end {
                if line.start_ms < last_end {
                    line.start_ms = last_end + OVERLAP_OFFSET_MS;
                }
                let gap = line.start_ms - last_end;
                if gap > self.config.scene_threshold_ms && !current.is_empty() {
                    scenes.push(self.create_scene(scenes.len() + 1, std::mem::take(&mut current)));
                }
            }
            last_end = Some(line.end_ms);
            current.push(line);
        }

        if !current.is_empty() {
            scenes.push(self.create_scene(scenes.len() + 1, current));
        }

        debug!(
            "Batched {} lines into {} scenes",
            lines.len(),
            scenes.len()
        );
        scenes
    }

    fn create_scene(&self, number: usize, lines: Vec<SubtitleLine>) -> SubtitleScene {
        let batches = self
            .split_lines(lines)
            .into_iter()
            .map(|lines| SubtitleBatch::new(number, 0, lines))
            .collect();
        SubtitleScene::new(number, batches)
    }

    /// Split lines into batches no larger than the maximum batch size.
    pub fn split_lines(&self, lines: Vec<SubtitleLine>) -> Vec<Vec<SubtitleLine>> {
        if lines.len() <= self.config.max_batch_size {
            return vec![lines];
        }

        let Some(split_index) = Self::find_largest_gap(&lines, self.config.min_batch_size) else {
            return vec![lines];
        };

        let mut lines = lines;
        let tail = lines.split_off(split_index);
        let mut batches = self.split_lines(lines);
        batches.extend(self.split_lines(tail));
        batches
    }

    /// Index in `[min_size, len - min_size)` with the largest gap before it.
    ///
    /// The first index reaching the maximum wins.
    pub fn find_largest_gap(lines: &[SubtitleLine], min_size: usize) -> Option<usize> {
        let min_size = min_size.max(1);
        if lines.len() < min_size * 2 {
            return None;
        }

        let mut best: Option<(usize, u64)> = None;
        for i in min_size..lines.len() - min_size {
            let gap = lines[i].gap_after(&lines[i - 1]);
            if best.is_none_or(|(_, largest)| gap > largest) {
                best = Some((i, gap));
            }
        }
        best.map(|(index, _)| index)
    }
}
