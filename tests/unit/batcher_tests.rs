/*!
 * Tests for scene and batch partitioning
 */

use subtrans::app_config::BatcherConfig;
use subtrans::batcher::SubtitleBatcher;
use subtrans::subtitles::SubtitleLine;

use crate::common::{self, fixture_batcher_config, fixture_lines};

#[test]
fn test_batcher_fixture_shouldProduceExpectedPartition() {
    let document = common::fixture_document();

    assert_eq!(document.scene_count(), 4);
    assert_eq!(common::batch_sizes(&document), vec![vec![14, 16], vec![12, 13], vec![6], vec![3]]);
    assert_eq!(document.line_count(), 64);
    assert!(document.check_contiguous().is_ok());
}

#[test]
fn test_batcher_fixture_scenesShouldStartAtSceneGaps() {
    let scenes = SubtitleBatcher::new(fixture_batcher_config()).batch_subtitles(&fixture_lines());

    let firsts: Vec<Option<usize>> = scenes.iter().map(|s| s.first_line_number()).collect();
    assert_eq!(firsts, vec![Some(1), Some(31), Some(56), Some(62)]);
    assert_eq!(scenes[0].batches[1].first_line_number(), Some(15));
}

#[test]
fn test_batcher_batchSizes_shouldStayWithinBounds() {
    let config = BatcherConfig {
        scene_threshold_ms: 10_000,
        min_batch_size: 3,
        max_batch_size: 8,
    };
    // Irregular gaps, one long scene
    let mut time = 0;
    let lines: Vec<SubtitleLine> = (1..=50)
        .map(|n| {
            time += 200 + (n as u64 * 37) % 900;
            let line = SubtitleLine::new(n, time, time + 800, format!("Line {}", n));
            time += 800;
            line
        })
        .collect();

    let scenes = SubtitleBatcher::new(config).batch_subtitles(&lines);

    assert_eq!(scenes.len(), 1);
    for batch in &scenes[0].batches {
        assert!(batch.size() >= 3, "batch of {} lines", batch.size());
        assert!(batch.size() <= 8, "batch of {} lines", batch.size());
    }
    assert_eq!(scenes[0].line_count(), 50);
}

#[test]
fn test_batcher_smallScene_shouldStayOneBatch() {
    let lines = &fixture_lines()[55..61];
    let scenes = SubtitleBatcher::new(fixture_batcher_config()).batch_subtitles(lines);

    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].size(), 1);
}

#[test]
fn test_batcher_findLargestGap_tooFewLines_shouldReturnNone() {
    let lines = &fixture_lines()[..5];
    assert_eq!(SubtitleBatcher::find_largest_gap(lines, 3), None);
}

#[test]
fn test_batcher_sameInput_shouldProduceSamePartition() {
    let mut lines = fixture_lines();
    // Overlap lines 5 and 40 with the lines before them
    lines[4].start_ms = lines[3].end_ms - 400;
    lines[39].start_ms = lines[38].start_ms;
    let batcher = SubtitleBatcher::new(fixture_batcher_config());

    let first = batcher.batch_subtitles(&lines);
    let second = batcher.batch_subtitles(&lines);

    assert_eq!(first, second);
    let line_5 = first.iter().flat_map(|s| s.batches.iter()).find_map(|b| b.get_original(5)).unwrap();
    assert_eq!(line_5.start_ms, lines[3].end_ms + 10);
    let line_40 = first.iter().flat_map(|s| s.batches.iter()).find_map(|b| b.get_original(40)).unwrap();
    assert_eq!(line_40.start_ms, lines[38].end_ms + 10);
}
