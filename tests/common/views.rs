/*!
 * A view that rebuilds a document from model updates alone
 */

use subtrans::model_update::{BatchKey, BatchUpdate, LineKey, LineUpdate, ModelUpdateView, SceneUpdate};
use subtrans::subtitles::{SubtitleBatch, SubtitleDocument, SubtitleLine, SubtitleScene};

/// Mirrors a document by applying the updates it is sent.
///
/// After every event has been applied the mirror should equal the document.
#[derive(Debug, Default)]
pub struct MirrorView {
    pub document: SubtitleDocument,
    pub operations: usize,
}

impl MirrorView {
    pub fn new(document: SubtitleDocument) -> Self {
        Self {
            document,
            operations: 0,
        }
    }

    fn scene_mut(&mut self, scene: usize) -> &mut SubtitleScene {
        &mut self.document.scenes[scene - 1]
    }

    fn batch_mut(&mut self, (scene, batch): BatchKey) -> &mut SubtitleBatch {
        &mut self.scene_mut(scene).batches[batch - 1]
    }

    fn line_mut(&mut self, (scene, batch, line): LineKey) -> &mut SubtitleLine {
        self.batch_mut((scene, batch))
            .get_original_mut(line)
            .expect("line exists in mirror")
    }
}

fn place<T>(items: &mut Vec<T>, index: usize, item: T) {
    if index < items.len() {
        items[index] = item;
    } else {
        items.push(item);
    }
}

impl ModelUpdateView for MirrorView {
    fn replace_scene(&mut self, scene: usize, item: &SubtitleScene) {
        self.operations += 1;
        place(&mut self.document.scenes, scene - 1, item.clone());
    }

    fn update_scene(&mut self, scene: usize, update: &SceneUpdate) {
        self.operations += 1;
        let target = self.scene_mut(scene);
        if let Some(summary) = &update.summary {
            target.summary = summary.clone();
        }
        if let Some(context) = &update.context {
            target.context = context.clone();
        }
    }

    fn remove_scene(&mut self, scene: usize) {
        self.operations += 1;
        self.document.scenes.remove(scene - 1);
    }

    fn add_scene(&mut self, scene: usize, item: &SubtitleScene) {
        self.operations += 1;
        self.document.scenes.insert(scene - 1, item.clone());
    }

    fn replace_batch(&mut self, key: BatchKey, item: &SubtitleBatch) {
        self.operations += 1;
        place(&mut self.scene_mut(key.0).batches, key.1 - 1, item.clone());
    }

    fn update_batch(&mut self, key: BatchKey, update: &BatchUpdate) {
        self.operations += 1;
        let batch = self.batch_mut(key);
        if let Some(summary) = &update.summary {
            batch.summary = summary.clone();
        }
        if let Some(context) = &update.context {
            batch.context = context.clone();
        }
        if let Some(errors) = &update.errors {
            batch.errors = errors.clone();
        }
        if let Some(response) = &update.response {
            batch.response = response.clone();
        }
        if let Some(fuzzy_matches) = &update.fuzzy_matches {
            batch.fuzzy_matches = fuzzy_matches.clone();
        }
    }

    fn remove_batch(&mut self, key: BatchKey) {
        self.operations += 1;
        self.scene_mut(key.0).batches.remove(key.1 - 1);
    }

    fn add_batch(&mut self, key: BatchKey, item: &SubtitleBatch) {
        self.operations += 1;
        self.scene_mut(key.0).batches.insert(key.1 - 1, item.clone());
    }

    fn replace_line(&mut self, key: LineKey, item: &SubtitleLine) {
        self.operations += 1;
        *self.line_mut(key) = item.clone();
    }

    fn update_line(&mut self, key: LineKey, update: &LineUpdate) {
        self.operations += 1;
        let line = self.line_mut(key);
        if let Some(text) = &update.text {
            line.text = text.clone();
        }
        if let Some(start_ms) = update.start_ms {
            line.start_ms = start_ms;
        }
        if let Some(end_ms) = update.end_ms {
            line.end_ms = end_ms;
        }
        let line = line.clone();

        let batch = self.batch_mut((key.0, key.1));
        if let Some(translated) = batch.translated.iter_mut().find(|l| l.number == key.2) {
            translated.start_ms = line.start_ms;
            translated.end_ms = line.end_ms;
        }
        match &update.translation {
            Some(Some(text)) => batch.set_translations(vec![line.translated(text.clone())]),
            Some(None) => {
                batch.translated.retain(|l| l.number != key.2);
                if let Some(original) = batch.get_original_mut(key.2) {
                    original.translation = None;
                }
            }
            None => {}
        }
    }

    fn remove_line(&mut self, key: LineKey) {
        self.operations += 1;
        let batch = self.batch_mut((key.0, key.1));
        batch.originals.retain(|l| l.number != key.2);
        batch.translated.retain(|l| l.number != key.2);
    }

    fn add_line(&mut self, key: LineKey, item: &SubtitleLine) {
        self.operations += 1;
        let batch = self.batch_mut((key.0, key.1));
        let index = batch.originals.partition_point(|l| l.number < item.number);
        batch.originals.insert(index, item.clone());
    }
}
