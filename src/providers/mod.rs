/*!
 * Translation backends.
 *
 * The core only needs a capability that turns a prompt into raw response
 * text. Network clients, retries and back-off live behind this trait; a
 * backend returns either the final text or a terminal failure.
 *
 * - `mock`: scripted backend for tests and benchmarks
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;
use crate::translation::TranslationPrompt;

/// Common trait for all translation backends
///
/// Implementations must be shareable between concurrently running
/// translation commands.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Translate a prompt, returning the raw response text
    ///
    /// # Arguments
    /// * `prompt` - The batch prompt to translate
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - The response text or an error
    async fn translate(&self, prompt: &TranslationPrompt) -> Result<String, ProviderError>;

    /// Name used in log messages
    fn name(&self) -> &str {
        "backend"
    }
}

pub mod mock;

pub use mock::{MockBackend, MockBehavior};
