/*!
 * Prompt construction for subtitle translation.
 *
 * This module provides:
 * - The instructions template
 * - The per-batch prompt built from scene and batch context
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, TranslationPrompt, TranslationPromptBuilder};
