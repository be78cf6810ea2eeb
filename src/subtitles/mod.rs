/*!
 * Document model for subtitle editing and translation.
 *
 * The hierarchy is scenes → batches → lines:
 * - `line`: a single timed line, translations linked by number
 * - `batch`: a contiguous run of lines translated together
 * - `scene`: batches grouped between long pauses
 * - `document`: the scene list and every structural operation
 * - `handle`: the reentrant lock shared by commands
 */

pub mod batch;
pub mod document;
pub mod handle;
pub mod line;
pub mod scene;

// Re-export main types for easier usage
pub use batch::SubtitleBatch;
pub use document::{DeletedLines, SubtitleDocument};
pub use handle::DocumentHandle;
pub use line::SubtitleLine;
pub use scene::SubtitleScene;
