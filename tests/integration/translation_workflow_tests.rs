/*!
 * Batching and translating the fixture through the command queue
 */

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use subtrans::commands::{
    BatchSubtitlesCommand, CommandContext, CommandQueue, QueueEvent, ReparseBatchesCommand, StartTranslationCommand,
    TranslateSceneCommand,
};
use subtrans::errors::{CommandError, TranslationError, ValidationError};
use subtrans::providers::MockBackend;
use subtrans::subtitles::{DocumentHandle, SubtitleDocument};

use crate::common::{self, views::MirrorView};

struct Session {
    queue: CommandQueue,
    events: UnboundedReceiver<QueueEvent>,
    context: CommandContext,
    backend: Arc<MockBackend>,
    mirror: MirrorView,
    received: Vec<QueueEvent>,
}

impl Session {
    fn start(backend: MockBackend) -> Self {
        common::init_test_logging();
        let config = common::fixture_config();
        let queue_config = config.queue.clone();
        let backend = Arc::new(backend);
        let context = CommandContext::new(DocumentHandle::new(SubtitleDocument::new(Vec::new())), config)
            .with_backend(backend.clone());
        let (queue, events) = CommandQueue::new(context.clone(), &queue_config);
        Self {
            queue,
            events,
            context,
            backend,
            mirror: MirrorView::new(SubtitleDocument::new(Vec::new())),
            received: Vec::new(),
        }
    }

    /// Batch the fixture and translate every scene
    async fn batch_and_translate(&mut self) {
        self.queue
            .submit(Box::new(BatchSubtitlesCommand::new(common::fixture_lines())))
            .unwrap();
        self.queue.submit(Box::new(StartTranslationCommand::new())).unwrap();
        self.settle().await;
    }

    /// Wait for the queue to go idle and feed every event to the mirror
    async fn settle(&mut self) {
        self.queue.wait_idle().await.unwrap();
        while let Ok(event) = self.events.try_recv() {
            for update in event.updates() {
                update.apply(&mut self.mirror);
            }
            self.received.push(event);
        }
    }

    fn document(&self) -> SubtitleDocument {
        self.context.document.snapshot()
    }

    fn failures(&self) -> Vec<&CommandError> {
        self.received
            .iter()
            .filter_map(|event| match event {
                QueueEvent::Failed { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }

    fn assert_mirrored(&self) {
        assert_eq!(self.mirror.document, self.document());
    }
}

#[tokio::test]
async fn test_translation_workingBackend_shouldTranslateWholeDocument() {
    let mut session = Session::start(MockBackend::working());

    session.batch_and_translate().await;

    let document = session.document();
    assert!(document.all_translated());
    assert_eq!(session.backend.request_count(), 6);
    assert!(session.failures().is_empty());
    for batch in document.batches() {
        assert!(batch.errors.is_empty(), "batch ({},{}) has errors", batch.scene, batch.number);
        let expected = format!(
            "Lines {} to {}",
            batch.first_line_number().unwrap(),
            batch.last_line_number().unwrap()
        );
        assert_eq!(batch.summary.as_deref(), Some(expected.as_str()));
    }
    let line = document.get_line(20).unwrap();
    assert_eq!(line.translation.as_deref(), Some("[TRANSLATED] Scene 1 says line 20"));
    session.assert_mirrored();

    let history = session.queue.history().await.unwrap();
    assert_eq!(history.undo.len(), 5);
    assert_eq!(history.undo[0], "BatchSubtitlesCommand");
    assert!(history.undo[1..].iter().all(|name| *name == "TranslateSceneCommand"));

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_undoAndRedo_shouldNotCallBackendAgain() {
    let mut session = Session::start(MockBackend::working());
    session.batch_and_translate().await;
    let translated = session.document();

    assert_eq!(session.queue.undo().await.unwrap(), "TranslateSceneCommand");
    session.settle().await;

    let document = session.document();
    assert!(!document.all_translated());
    assert_eq!(document.scenes.iter().filter(|scene| !scene.any_translated()).count(), 1);
    session.assert_mirrored();

    assert_eq!(session.queue.redo().await.unwrap(), "TranslateSceneCommand");
    session.settle().await;

    assert_eq!(session.document(), translated);
    assert_eq!(session.backend.request_count(), 6);
    session.assert_mirrored();

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_partialBackend_shouldRecordUnmatchedLines() {
    let mut session = Session::start(MockBackend::partial());

    session.batch_and_translate().await;

    let document = session.document();
    assert!(document.any_translated());
    assert!(!document.all_translated());
    assert!(session.failures().is_empty());

    let batch = document.get_batch(1, 1).unwrap();
    let unmatched: Vec<usize> = (2..=14).step_by(2).collect();
    assert_eq!(batch.errors, vec![ValidationError::UnmatchedLines(unmatched)]);
    assert_eq!(batch.summary.as_deref(), Some("Lines 1 to 13"));
    assert!(batch.get_translated(2).is_none());
    session.assert_mirrored();

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_failingBackend_shouldReportEveryScene() {
    let mut session = Session::start(MockBackend::failing());

    session.batch_and_translate().await;

    let failures = session.failures();
    assert_eq!(failures.len(), 4);
    assert!(failures.iter().all(|error| matches!(
        error,
        CommandError::Translation {
            source: TranslationError::Provider(_),
            ..
        }
    )));
    assert!(!session.document().any_translated());
    assert_eq!(session.queue.history().await.unwrap().undo, vec!["BatchSubtitlesCommand"]);
    session.assert_mirrored();

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_intermittentBackend_shouldKeepEarlierBatches() {
    let mut session = Session::start(MockBackend::intermittent(3));

    session.batch_and_translate().await;

    assert!(!session.failures().is_empty());
    assert!(session.document().any_translated());
    // Updates from batches translated before a failure arrive with the failure
    session.assert_mirrored();

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_abortDuringRequest_shouldDiscardResponse() {
    let mut session = Session::start(MockBackend::slow(100));
    session
        .queue
        .submit(Box::new(BatchSubtitlesCommand::new(common::fixture_lines())))
        .unwrap();
    session.settle().await;
    let batched = session.document();

    session.queue.submit(Box::new(TranslateSceneCommand::new(3))).unwrap();
    loop {
        match session.events.recv().await {
            Some(QueueEvent::Started { name: "TranslateSceneCommand", .. }) => break,
            Some(_) => continue,
            None => panic!("event stream closed"),
        }
    }
    assert_eq!(session.queue.abort_all(), 1);
    session.settle().await;

    let failures = session.failures();
    assert!(matches!(
        failures.as_slice(),
        [CommandError::Aborted {
            command: "TranslateSceneCommand"
        }]
    ));
    assert_eq!(session.document(), batched);
    assert_eq!(session.backend.request_count(), 1);

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_reparseEditedResponse_shouldReplaceTranslations() {
    let mut session = Session::start(MockBackend::working());
    session.batch_and_translate().await;

    let response = "#62\nOriginal>\nScene 4 says line 62\nTranslation>\nSoixante-deux\n\n\
                    #63\nOriginal>\nScene 4 says line 63\nTranslation>\nSoixante-trois\n";
    session.mirror.document.get_batch_mut(4, 1).unwrap().response = Some(response.to_string());
    session
        .context
        .document
        .write(|doc| doc.get_batch_mut(4, 1).unwrap().response = Some(response.to_string()));
    let before = session.document();

    session
        .queue
        .submit(Box::new(ReparseBatchesCommand::new(vec![(4, 1)])))
        .unwrap();
    session.settle().await;

    let document = session.document();
    let batch = document.get_batch(4, 1).unwrap();
    assert_eq!(batch.get_translated(62).map(|l| l.text.as_str()), Some("Soixante-deux"));
    assert!(batch.get_translated(64).is_none());
    assert_eq!(batch.errors, vec![ValidationError::UnmatchedLines(vec![64])]);
    // No summary tag in the edited response, so the old summary stays
    assert_eq!(batch.summary.as_deref(), Some("Lines 62 to 64"));
    session.assert_mirrored();

    assert_eq!(session.queue.undo().await.unwrap(), "ReparseBatchesCommand");
    session.settle().await;
    assert_eq!(session.document(), before);
    session.assert_mirrored();

    session.queue.stop().await.unwrap();
}

#[tokio::test]
async fn test_translation_driftedNumbering_shouldRecordFuzzyMatches() {
    let mut session = Session::start(MockBackend::drifted());

    session.batch_and_translate().await;

    let document = session.document();
    assert!(document.all_translated());
    let batch = document.get_batch(1, 1).unwrap();
    let fuzzy: Vec<usize> = (2..=14).step_by(2).collect();
    assert_eq!(batch.fuzzy_matches, fuzzy);
    assert!(batch.errors.is_empty());
    assert_eq!(
        batch.get_translated(4).map(|l| l.text.as_str()),
        Some("[TRANSLATED] Scene 1 says line 4")
    );
    assert!(document.get_batch(4, 1).unwrap().fuzzy_matches.contains(&63));
    session.assert_mirrored();

    assert_eq!(session.queue.undo().await.unwrap(), "TranslateSceneCommand");
    session.settle().await;
    let cleared = session
        .document()
        .scenes
        .iter()
        .filter(|scene| scene.batches.iter().all(|batch| batch.fuzzy_matches.is_empty()))
        .count();
    assert_eq!(cleared, 1);
    session.assert_mirrored();

    session.queue.stop().await.unwrap();
}
