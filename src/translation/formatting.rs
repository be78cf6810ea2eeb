/*!
 * Line template shared by prompts and the response parser.
 *
 * Each line is sent to the backend as:
 *
 * ```text
 * #12
 * Original>
 * Where are you going?
 * Translation>
 * ```
 *
 * and the backend is asked to reply in the same shape with the translation
 * filled in. Content comparison ignores case, whitespace and punctuation so
 * that echoed text can be recognised even when the backend reformats it.
 */

use crate::subtitles::SubtitleLine;

/// Marker that precedes the source text
pub const ORIGINAL_MARKER: &str = "Original>";

/// Marker that precedes the translated text
pub const TRANSLATION_MARKER: &str = "Translation>";

/// Format one line with the line template.
///
/// The translation slot holds `line.translation` when present.
pub fn format_line(line: &SubtitleLine) -> String {
    format_entry(line.number, &line.text, line.translation.as_deref().unwrap_or(""))
}

/// Format a numbered entry with explicit original and translation text
pub fn format_entry(number: usize, original: &str, translation: &str) -> String {
    let mut entry = format!("#{}\n{}\n{}\n{}\n", number, ORIGINAL_MARKER, original, TRANSLATION_MARKER);
    if !translation.is_empty() {
        entry.push_str(translation);
        entry.push('\n');
    }
    entry
}

/// Format lines separated by blank lines
pub fn format_lines<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a SubtitleLine>,
{
    lines
        .into_iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce text to lowercase alphanumerics for content comparison
pub fn normalize_content(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Whether two texts have the same content ignoring case, whitespace and punctuation
pub fn is_content_equal(first: &str, second: &str) -> bool {
    normalize_content(first) == normalize_content(second)
}
