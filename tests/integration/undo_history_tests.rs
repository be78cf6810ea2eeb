/*!
 * Undo and redo of document edits through the command queue
 */

use tokio::sync::mpsc::UnboundedReceiver;

use subtrans::commands::{
    BatchSubtitlesCommand, CommandContext, CommandQueue, DeleteLinesCommand, EditLineCommand, LineEdit,
    MergeScenesCommand, QueueEvent, RenumberCommand, SplitBatchCommand,
};
use subtrans::errors::UndoError;
use subtrans::subtitles::{DocumentHandle, SubtitleDocument};

use crate::common::{self, views::MirrorView};

fn start(document: SubtitleDocument) -> (CommandQueue, UnboundedReceiver<QueueEvent>, CommandContext) {
    common::init_test_logging();
    let config = common::fixture_config();
    let queue_config = config.queue.clone();
    let context = CommandContext::new(DocumentHandle::new(document), config);
    let (queue, events) = CommandQueue::new(context.clone(), &queue_config);
    (queue, events, context)
}

fn apply_events(mirror: &mut MirrorView, events: &mut UnboundedReceiver<QueueEvent>) {
    while let Ok(event) = events.try_recv() {
        for update in event.updates() {
            update.apply(mirror);
        }
    }
}

#[tokio::test]
async fn test_history_undoAndRedo_shouldWalkThroughStructuralEdits() {
    let (queue, mut events, context) = start(common::fixture_document());
    let original = context.document.snapshot();
    let mut mirror = MirrorView::new(original.clone());

    queue.submit(Box::new(MergeScenesCommand::new(vec![1, 2]))).unwrap();
    queue.submit(Box::new(SplitBatchCommand::new(1, 3, 40))).unwrap();
    queue.submit(Box::new(EditLineCommand::new(41, LineEdit::text("Edited")))).unwrap();
    queue.wait_idle().await.unwrap();
    let edited = context.document.snapshot();
    apply_events(&mut mirror, &mut events);
    assert_eq!(mirror.document, edited);
    assert_eq!(common::batch_sizes(&edited)[0], vec![14, 16, 9, 3, 13]);

    assert_eq!(queue.undo().await.unwrap(), "EditLineCommand");
    assert_eq!(queue.undo().await.unwrap(), "SplitBatchCommand");
    assert_eq!(queue.undo().await.unwrap(), "MergeScenesCommand");
    assert!(matches!(queue.undo().await, Err(UndoError::NothingToUndo)));
    apply_events(&mut mirror, &mut events);
    assert_eq!(context.document.snapshot(), original);
    assert_eq!(mirror.document, original);

    let history = queue.history().await.unwrap();
    assert!(history.undo.is_empty());
    assert_eq!(history.redo, vec!["EditLineCommand", "SplitBatchCommand", "MergeScenesCommand"]);

    for _ in 0..3 {
        queue.redo().await.unwrap();
    }
    assert!(matches!(queue.redo().await, Err(UndoError::NothingToRedo)));
    apply_events(&mut mirror, &mut events);
    assert_eq!(context.document.snapshot(), edited);
    assert_eq!(mirror.document, edited);

    queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_history_newCommandAfterUndo_shouldClearRedo() {
    let (queue, _events, context) = start(common::fixture_document());

    queue.submit(Box::new(DeleteLinesCommand::new(vec![5]))).unwrap();
    queue.wait_idle().await.unwrap();
    queue.undo().await.unwrap();
    assert_eq!(queue.history().await.unwrap().redo, vec!["DeleteLinesCommand"]);

    queue.submit(Box::new(DeleteLinesCommand::new(vec![6]))).unwrap();
    queue.wait_idle().await.unwrap();

    let history = queue.history().await.unwrap();
    assert_eq!(history.undo, vec!["DeleteLinesCommand"]);
    assert!(history.redo.is_empty());
    assert!(matches!(queue.redo().await, Err(UndoError::NothingToRedo)));
    context.document.read(|doc| {
        assert!(doc.get_line(5).is_ok());
        assert!(doc.get_line(6).is_err());
    });
    queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_history_batchSubtitles_shouldBarUndoPastIt() {
    let (queue, mut events, context) = start(SubtitleDocument::new(Vec::new()));
    let mut mirror = MirrorView::new(SubtitleDocument::new(Vec::new()));

    queue.submit(Box::new(BatchSubtitlesCommand::new(common::fixture_lines()))).unwrap();
    queue.submit(Box::new(DeleteLinesCommand::new(vec![1, 2]))).unwrap();
    queue.submit(Box::new(RenumberCommand::new())).unwrap();
    queue.wait_idle().await.unwrap();

    apply_events(&mut mirror, &mut events);
    assert_eq!(mirror.document, context.document.snapshot());
    context.document.read(|doc| {
        assert_eq!(doc.line_count(), 62);
        assert!(doc.check_contiguous().is_ok());
    });

    assert_eq!(queue.undo().await.unwrap(), "RenumberCommand");
    assert_eq!(queue.undo().await.unwrap(), "DeleteLinesCommand");
    assert!(matches!(
        queue.undo().await,
        Err(UndoError::NotUndoable("BatchSubtitlesCommand"))
    ));

    let history = queue.history().await.unwrap();
    assert_eq!(history.undo, vec!["BatchSubtitlesCommand"]);
    apply_events(&mut mirror, &mut events);
    assert_eq!(mirror.document, common::fixture_document());
    assert_eq!(context.document.snapshot(), common::fixture_document());

    queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_history_failedUndo_shouldKeepCommandOnStack() {
    let (queue, _events, context) = start(common::fixture_document());

    queue.submit(Box::new(SplitBatchCommand::new(1, 1, 5))).unwrap();
    queue.wait_idle().await.unwrap();

    // Pull the document out from under the command
    context.document.replace(SubtitleDocument::new(Vec::new()));
    assert!(matches!(queue.undo().await, Err(UndoError::Document { .. })));
    assert_eq!(queue.history().await.unwrap().undo, vec!["SplitBatchCommand"]);

    queue.stop().await.unwrap();
}
