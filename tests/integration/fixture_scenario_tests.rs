/*!
 * Structural edits on the 64-line fixture document
 */

use std::collections::BTreeMap;

use subtrans::commands::{
    AutoSplitBatchCommand, Command, CommandContext, DeleteLinesCommand, EditBatchCommand, EditLineCommand,
    EditSceneCommand, InsertLinesCommand, LineEdit, MergeBatchesCommand, MergeScenesCommand, RenumberCommand,
    SplitBatchCommand, SplitSceneCommand,
};
use subtrans::model_update::ModelUpdate;
use subtrans::subtitles::SubtitleLine;

use crate::common::{self, views::MirrorView};

fn fixture_context() -> CommandContext {
    common::init_test_logging();
    common::context_for(common::fixture_document(), common::fixture_config())
}

fn apply_all(mirror: &mut MirrorView, updates: &[ModelUpdate]) {
    for update in updates {
        update.apply(mirror);
    }
}

/// Execute then undo, checking that a mirror fed only the model updates
/// tracks the document at both steps
async fn execute_and_undo_mirrored(mut command: Box<dyn Command>, context: &CommandContext) {
    let before = context.document.snapshot();
    let mut mirror = MirrorView::new(before.clone());

    command.execute(context).await.unwrap();
    let updates = command.state_mut().take_model_updates();
    assert!(!updates.is_empty(), "{} reported no changes", command.name());
    apply_all(&mut mirror, &updates);
    assert_eq!(mirror.document, context.document.snapshot(), "{} execute", command.name());
    assert!(context.document.read(|doc| doc.check_numbering()).is_ok());

    command.undo(context).unwrap();
    let updates = command.state_mut().take_model_updates();
    apply_all(&mut mirror, &updates);
    assert_eq!(context.document.snapshot(), before, "{} undo", command.name());
    assert_eq!(mirror.document, before, "{} undo mirror", command.name());
}

#[tokio::test]
async fn test_fixture_mergeTrailingScenes_shouldJoinBatchesAndSummaries() {
    let context = fixture_context();
    context.document.write(|doc| {
        doc.get_batch_mut(3, 1).unwrap().summary = Some("Arrival".to_string());
        doc.get_batch_mut(4, 1).unwrap().summary = Some("Departure".to_string());
    });

    let mut merge_scenes = MergeScenesCommand::new(vec![3, 4]);
    merge_scenes.execute(&context).await.unwrap();

    context.document.read(|doc| {
        assert_eq!(doc.scene_count(), 3);
        let scene = doc.get_scene(3).unwrap();
        assert_eq!(scene.size(), 2);
        assert_eq!(scene.first_line_number(), Some(56));
        assert_eq!(scene.last_line_number(), Some(64));
    });

    let mut merge_batches = MergeBatchesCommand::new(3, vec![1, 2]);
    merge_batches.execute(&context).await.unwrap();

    context.document.read(|doc| {
        let batch = doc.get_batch(3, 1).unwrap();
        assert_eq!(batch.size(), 9);
        assert_eq!(batch.summary.as_deref(), Some("Arrival\nDeparture"));
        assert!(doc.check_contiguous().is_ok());
    });

    merge_batches.undo(&context).unwrap();
    merge_scenes.undo(&context).unwrap();
    assert_eq!(common::batch_sizes(&context.document.snapshot()), vec![vec![14, 16], vec![12, 13], vec![6], vec![3]]);
}

#[tokio::test]
async fn test_fixture_splitFirstScene_shouldShiftLaterScenes() {
    let context = fixture_context();

    let mut command = SplitSceneCommand::new(1, 2);
    command.execute(&context).await.unwrap();

    context.document.read(|doc| {
        assert_eq!(doc.scene_count(), 5);
        assert_eq!(doc.get_scene(2).unwrap().first_line_number(), Some(15));
        assert_eq!(doc.get_scene(3).unwrap().first_line_number(), Some(31));
        assert_eq!(doc.get_batch(2, 1).unwrap().scene, 2);
    });
    assert_eq!(
        common::batch_sizes(&context.document.snapshot()),
        vec![vec![14], vec![16], vec![12, 13], vec![6], vec![3]]
    );
}

#[tokio::test]
async fn test_fixture_autoSplit_uniformGaps_shouldSplitAtMiddle() {
    let context = fixture_context();

    let mut command = AutoSplitBatchCommand::new(1, 2).with_min_size(4);
    command.execute(&context).await.unwrap();

    assert_eq!(command.split_line(), Some(23));
    assert_eq!(common::batch_sizes(&context.document.snapshot())[0], vec![14, 8, 8]);
}

#[tokio::test]
async fn test_fixture_autoSplit_configuredMinimum_shouldRejectSmallBatch() {
    let context = fixture_context();

    let mut command = AutoSplitBatchCommand::new(3, 1);
    let error = command.execute(&context).await.unwrap_err();

    assert_eq!(error.command(), "AutoSplitBatchCommand");
    assert!(error.to_string().contains("Batch too small to split: 6 lines, need at least 20"));
}

#[tokio::test]
async fn test_fixture_everyCommand_shouldUndoAndReportCompleteUpdates() {
    let context = fixture_context();
    let mut context_values = BTreeMap::new();
    context_values.insert("setting".to_string(), "A harbour at night".to_string());

    let commands: Vec<Box<dyn Command>> = vec![
        Box::new(MergeScenesCommand::new(vec![1, 2])),
        Box::new(MergeScenesCommand::new(vec![2, 3, 4])),
        Box::new(MergeBatchesCommand::new(1, vec![1, 2])),
        Box::new(SplitSceneCommand::new(2, 2)),
        Box::new(SplitBatchCommand::new(1, 2, 20)),
        Box::new(AutoSplitBatchCommand::new(2, 2).with_min_size(3)),
        Box::new(DeleteLinesCommand::new(vec![3, 40, 62, 63, 64])),
        Box::new(InsertLinesCommand::new(
            vec![SubtitleLine::new(65, 200_000, 201_000, "An extra line")],
            Vec::new(),
        )),
        Box::new(InsertLinesCommand::new(
            Vec::new(),
            vec![SubtitleLine::new(80, 0, 0, "Orphan").translated("Orpheline")],
        )),
        Box::new(EditLineCommand::new(5, LineEdit::text("Rewritten"))),
        Box::new(EditLineCommand::new(6, LineEdit::translation(Some("Traduit".to_string())))),
        Box::new(EditLineCommand::new(7, LineEdit::timing(4_000, 4_900))),
        Box::new(EditBatchCommand::new(2, 1).with_summary(Some("Batch summary".to_string()))),
        Box::new(EditSceneCommand::new(3).with_context(context_values)),
    ];

    for command in commands {
        execute_and_undo_mirrored(command, &context).await;
    }
}

#[tokio::test]
async fn test_fixture_renumberAfterDelete_shouldUndoToGappedNumbers() {
    let context = fixture_context();
    let mut delete = DeleteLinesCommand::new(vec![10, 11]);
    delete.execute(&context).await.unwrap();
    let gapped = context.document.snapshot();
    assert!(gapped.check_contiguous().is_err());

    execute_and_undo_mirrored(Box::new(RenumberCommand::new()), &context).await;
    assert_eq!(context.document.snapshot(), gapped);

    let mut renumber = RenumberCommand::new();
    renumber.execute(&context).await.unwrap();
    context.document.read(|doc| {
        assert!(doc.check_contiguous().is_ok());
        assert_eq!(doc.line_count(), 62);
        assert_eq!(doc.get_line(10).unwrap().text, "Scene 1 says line 12");
    });
}

#[tokio::test]
async fn test_fixture_failedCommand_shouldLeaveDocumentUnchanged() {
    let context = fixture_context();
    let before = context.document.snapshot();

    let failing: Vec<Box<dyn Command>> = vec![
        Box::new(MergeScenesCommand::new(vec![2, 4])),
        Box::new(MergeBatchesCommand::new(1, vec![2, 3])),
        Box::new(SplitSceneCommand::new(3, 1)),
        Box::new(SplitBatchCommand::new(1, 1, 1)),
        Box::new(DeleteLinesCommand::new(vec![5, 99])),
        Box::new(InsertLinesCommand::new(vec![SubtitleLine::new(8, 0, 0, "Taken")], Vec::new())),
        Box::new(InsertLinesCommand::new(
            vec![SubtitleLine::new(70, 0, 0, "Twice"), SubtitleLine::new(70, 0, 0, "Twice")],
            vec![SubtitleLine::new(70, 0, 0, "Twice").translated("Deux fois")],
        )),
        Box::new(EditLineCommand::new(99, LineEdit::text("Nowhere"))),
    ];

    for mut command in failing {
        assert!(command.execute(&context).await.is_err(), "{} should fail", command.name());
        assert!(command.state().model_updates().is_empty());
        assert_eq!(context.document.snapshot(), before, "{} changed the document", command.name());
    }
}

#[tokio::test]
async fn test_fixture_insertOrphanTranslation_shouldJoinLastBatch() {
    let context = fixture_context();

    let mut command = InsertLinesCommand::new(
        Vec::new(),
        vec![SubtitleLine::new(80, 0, 0, "Orphan").translated("Orpheline")],
    );
    command.execute(&context).await.unwrap();

    context.document.read(|doc| {
        let batch = doc.get_batch(4, 1).unwrap();
        assert_eq!(batch.get_translated(80).map(|l| l.text.as_str()), Some("Orpheline"));
        assert!(batch.get_original(80).is_none());
        assert!(doc.check_numbering().is_ok());
    });

    command.undo(&context).unwrap();
    assert_eq!(context.document.snapshot(), common::fixture_document());
}
