/*!
 * Parsing of free-text backend responses into translated lines.
 *
 * The response for a batch is expected to repeat the line template with the
 * translation filled in. Backends drift from that shape, so parsing tries an
 * ordered list of progressively looser patterns and keeps the first one that
 * yields any entry:
 *
 * 1. `strict`: `#N` / `Original>` / `Translation>` exactly as sent
 * 2. `relaxed`: optional `#`, `:` or `>` markers, any case and spacing,
 *    the `Original` section optional
 * 3. `blocks`: a number followed by everything up to the next blank line
 *
 * Entries are then reconciled with the source lines by number. An entry whose
 * echoed original matches its own translation body instead of the source text
 * is taken to be swapped and flipped back. Source lines without a numbered
 * entry are recovered by content from entries that echo their text; those
 * are reported as fuzzy matches.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::app_config::ParserConfig;
use crate::errors::{TranslationError, ValidationError};
use crate::subtitles::SubtitleLine;
use crate::validation::LengthValidator;

use super::formatting::is_content_equal;

/// A header regex locating numbered entries and an entry regex applied to
/// the text between consecutive headers
struct EntryPattern {
    name: &'static str,
    header: Regex,
    entry: Regex,
}

static ENTRY_PATTERNS: Lazy<Vec<EntryPattern>> = Lazy::new(|| {
    vec![
        EntryPattern {
            name: "strict",
            header: Regex::new(r"(?m)^#(\d+)[ \t]*$").unwrap(),
            entry: Regex::new(r"(?s)\AOriginal>\n(.*?)\nTranslation>\n?(.*)\z").unwrap(),
        },
        EntryPattern {
            name: "relaxed",
            header: Regex::new(r"(?m)^[ \t]*#?[ \t]*(\d+)[ \t]*[.:)]?[ \t]*$").unwrap(),
            entry: Regex::new(
                r"(?is)\A\s*(?:original\s*[>:]\s*(.*?)\s*)?translation\s*[>:]\s*(.*?)\s*\z",
            )
            .unwrap(),
        },
    ]
});

/// First line of a block in the last-resort pattern
static BLOCK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A[ \t]*#?[ \t]*(\d+)[ \t]*[.:)>-]?[ \t]*(.*)\z").unwrap());

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

static SUMMARY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<summary>(.*?)</summary>").unwrap());

static SCENE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<scene>(.*?)</scene>").unwrap());

/// A numbered entry extracted from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Line number given by the backend
    pub number: usize,
    /// Echoed source text, if the backend included it
    pub original: Option<String>,
    /// Translated text
    pub body: String,
}

/// Outcome of parsing one batch's response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    /// Translated lines, sorted by number.
    ///
    /// Entries that match no source line are kept with zero timing so they
    /// surface as orphaned translations.
    pub translated: Vec<SubtitleLine>,
    /// Source lines for which no translation was found
    pub unmatched: Vec<SubtitleLine>,
    /// Numbers of source lines recovered by content instead of by number
    pub fuzzy_matches: Vec<usize>,
    /// Line-level faults
    pub errors: Vec<ValidationError>,
    /// Text of the `<summary>` tag
    pub summary: Option<String>,
    /// Text of the `<scene>` tag
    pub scene_summary: Option<String>,
}

impl ParseResult {
    /// Whether any translation was found
    pub fn has_translations(&self) -> bool {
        !self.translated.is_empty()
    }

    /// Convert an empty result into an error
    pub fn require_translations(self) -> Result<Self, TranslationError> {
        if self.has_translations() {
            Ok(self)
        } else {
            Err(TranslationError::NoTranslation)
        }
    }
}

/// Parser for backend responses
#[derive(Debug, Clone, Default)]
pub struct TranslationParser {
    validator: LengthValidator,
}

impl TranslationParser {
    /// Create a parser validating against the given limits
    pub fn new(config: ParserConfig) -> Self {
        Self {
            validator: LengthValidator::new(config),
        }
    }

    /// Parse a response and reconcile it with the batch's source lines
    pub fn parse(&self, text: &str, source_lines: &[SubtitleLine]) -> ParseResult {
        let text = text.replace("\r\n", "\n");
        let summary = extract_tag(&SUMMARY_TAG, &text);
        let scene_summary = extract_tag(&SCENE_TAG, &text);
        let body = SCENE_TAG.replace_all(&SUMMARY_TAG.replace_all(&text, ""), "").into_owned();

        let mut result = ParseResult {
            summary,
            scene_summary,
            ..ParseResult::default()
        };

        let entries = parse_entries(&body);
        if entries.is_empty() {
            warn!("No translations found in response of {} characters", text.len());
            result.unmatched = source_lines.to_vec();
            result.errors.push(ValidationError::NoTranslation);
            return result;
        }

        let mut by_number: BTreeMap<usize, ParsedEntry> = BTreeMap::new();
        for entry in entries {
            if by_number.contains_key(&entry.number) {
                warn!("Line {} appears more than once in the response, keeping the first", entry.number);
                continue;
            }
            by_number.insert(entry.number, entry);
        }

        let mut used: HashSet<usize> = HashSet::new();
        let mut unmatched = Vec::new();
        for line in source_lines {
            match by_number.get(&line.number) {
                Some(entry) => {
                    let body = fix_swapped(entry, &line.text);
                    result.translated.push(line.translated(body));
                    used.insert(entry.number);
                }
                None => unmatched.push(line),
            }
        }

        for line in unmatched {
            let candidate = by_number.values().find(|entry| {
                !used.contains(&entry.number)
                    && entry
                        .original
                        .as_deref()
                        .is_some_and(|original| is_content_equal(original, &line.text))
            });
            match candidate {
                Some(entry) => {
                    warn!(
                        "Line {} matched by content to response entry {}",
                        line.number, entry.number
                    );
                    result.translated.push(line.translated(entry.body.clone()));
                    result.fuzzy_matches.push(line.number);
                    used.insert(entry.number);
                }
                None => result.unmatched.push(line.clone()),
            }
        }

        let mut orphaned = Vec::new();
        for entry in by_number.values().filter(|entry| !used.contains(&entry.number)) {
            result
                .translated
                .push(SubtitleLine::new(entry.number, 0, 0, entry.body.clone()));
            orphaned.push(entry.number);
        }
        result.translated.sort_by_key(|line| line.number);

        if !result.unmatched.is_empty() {
            result.errors.push(ValidationError::UnmatchedLines(
                result.unmatched.iter().map(|line| line.number).collect(),
            ));
        }
        result.errors.extend(self.validator.validate_lines(&result.translated));
        if !orphaned.is_empty() {
            result.errors.push(ValidationError::OrphanedTranslations(orphaned));
        }

        debug!(
            "Parsed {} translations, {} unmatched, {} fuzzy",
            result.translated.len(),
            result.unmatched.len(),
            result.fuzzy_matches.len()
        );
        result
    }
}

/// Extract numbered entries with the first pattern that yields any
pub fn parse_entries(text: &str) -> Vec<ParsedEntry> {
    for pattern in ENTRY_PATTERNS.iter() {
        let entries = pattern.parse(text);
        if !entries.is_empty() {
            debug!("Parsed {} entries with the {} pattern", entries.len(), pattern.name);
            return entries;
        }
    }

    let entries = parse_blocks(text);
    if !entries.is_empty() {
        debug!("Parsed {} entries with the blocks pattern", entries.len());
    }
    entries
}

impl EntryPattern {
    fn parse(&self, text: &str) -> Vec<ParsedEntry> {
        let headers: Vec<(usize, usize, usize)> = self
            .header
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1)?.as_str().parse().ok()?;
                Some((number, whole.start(), whole.end()))
            })
            .collect();

        let mut entries = Vec::new();
        for (index, &(number, _, end)) in headers.iter().enumerate() {
            let next_start = headers.get(index + 1).map_or(text.len(), |&(_, start, _)| start);
            let section = text[end..next_start].trim_start_matches(['\n', '\r']).trim_end();
            let Some(caps) = self.entry.captures(section) else {
                continue;
            };
            let original = caps.get(1).map(|m| m.as_str().trim().to_string());
            let body = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            entries.push(ParsedEntry {
                number,
                original,
                body,
            });
        }
        entries
    }
}

/// Last resort: a number starting a block of text that runs to the next blank line
fn parse_blocks(text: &str) -> Vec<ParsedEntry> {
    BLANK_LINE
        .split(text)
        .filter_map(|block| {
            let block = block.trim_matches('\n');
            let (first, rest) = block.split_once('\n').unwrap_or((block, ""));
            let caps = BLOCK_HEADER.captures(first)?;
            let number = caps.get(1)?.as_str().parse().ok()?;
            let inline = caps.get(2).map_or("", |m| m.as_str()).trim();
            let body = [inline, rest.trim()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            if body.is_empty() {
                return None;
            }
            Some(ParsedEntry {
                number,
                original: None,
                body,
            })
        })
        .collect()
}

/// The translation body, flipped with the echoed original when the two were swapped
fn fix_swapped(entry: &ParsedEntry, source_text: &str) -> String {
    if let Some(original) = &entry.original {
        if !is_content_equal(original, source_text) && is_content_equal(&entry.body, source_text) {
            warn!("Original and translation swapped for line {}, flipping", entry.number);
            return original.clone();
        }
    }
    entry.body.clone()
}

fn extract_tag(tag: &Regex, text: &str) -> Option<String> {
    tag.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
