/*!
 * Translation request and response handling.
 *
 * - `formatting`: the line template and content comparison
 * - `prompts`: prompt templates and builders for translation
 * - `parser`: reconciliation of backend responses with source lines
 */

// Re-export main types for easier usage
pub use self::formatting::{format_line, format_lines, is_content_equal, normalize_content};
pub use self::parser::{ParseResult, ParsedEntry, TranslationParser};
pub use self::prompts::{PromptTemplate, TranslationPrompt, TranslationPromptBuilder};

// Submodules
pub mod formatting;
pub mod parser;
pub mod prompts;
