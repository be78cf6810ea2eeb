/*!
 * Tests for parsing backend responses against fixture batches
 */

use subtrans::app_config::ParserConfig;
use subtrans::errors::ValidationError;
use subtrans::providers::MockBackend;
use subtrans::translation::{TranslationParser, TranslationPromptBuilder};

use crate::common;

#[test]
fn test_parser_mockResponse_shouldMatchEveryFixtureLine() {
    let document = common::fixture_document();
    let batch = document.get_batch(1, 2).unwrap();
    let prompt = TranslationPromptBuilder::new("English", "French")
        .with_lines(&batch.originals)
        .build();

    let result = TranslationParser::default().parse(&MockBackend::generate_response(&prompt.lines), &prompt.lines);

    assert_eq!(result.translated.len(), 16);
    assert!(result.unmatched.is_empty());
    assert!(result.errors.is_empty());
    assert_eq!(result.summary.as_deref(), Some("Lines 15 to 30"));
    for (line, translated) in batch.originals.iter().zip(&result.translated) {
        assert_eq!(translated.number, line.number);
        assert_eq!(translated.start_ms, line.start_ms);
        assert_eq!(translated.text, MockBackend::translate_text(&line.text));
    }
}

#[test]
fn test_parser_promptLines_shouldNotParseAsTranslations() {
    let document = common::fixture_document();
    let lines = &document.get_batch(4, 1).unwrap().originals;
    let prompt = TranslationPromptBuilder::new("English", "French").with_lines(lines).build();

    // The prompt itself has every translation slot empty
    let result = TranslationParser::default().parse(&prompt.user, lines);

    assert!(result.errors.contains(&ValidationError::EmptyLines(vec![62, 63, 64])));
}

#[test]
fn test_parser_windowsLineEndings_shouldParse() {
    let lines = &common::fixture_lines()[..2];
    let response = "#1\r\nOriginal>\r\nScene 1 says line 1\r\nTranslation>\r\nUn\r\n\r\n#2\r\nOriginal>\r\nScene 1 says line 2\r\nTranslation>\r\nDeux\r\n";

    let result = TranslationParser::default().parse(response, lines);

    let texts: Vec<&str> = result.translated.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["Un", "Deux"]);
}

#[test]
fn test_parser_relaxedResponse_shouldParse() {
    let lines = &common::fixture_lines()[..2];
    let response = "1.\noriginal: Scene 1 says line 1\ntranslation: Un\n\n2.\nTRANSLATION: Deux\n";

    let result = TranslationParser::default().parse(response, lines);

    assert_eq!(result.translated.len(), 2);
    assert_eq!(result.translated[1].text, "Deux");
    assert!(result.errors.is_empty());
}

#[test]
fn test_parser_extraEntry_shouldBeKeptAsOrphan() {
    let lines = &common::fixture_lines()[..1];
    let response = "#1\nOriginal>\nScene 1 says line 1\nTranslation>\nUn\n\n#99\nOriginal>\nGhost\nTranslation>\nFantôme\n";

    let result = TranslationParser::default().parse(response, lines);

    assert_eq!(result.translated.len(), 2);
    assert_eq!(result.translated[1].number, 99);
    assert_eq!(result.errors, vec![ValidationError::OrphanedTranslations(vec![99])]);
}

#[test]
fn test_parser_tightLimits_shouldFlagLongLines() {
    let lines = &common::fixture_lines()[..1];
    let response = "#1\nOriginal>\nScene 1 says line 1\nTranslation>\nUne phrase beaucoup trop longue\n";
    let parser = TranslationParser::new(ParserConfig {
        max_characters: 10,
        max_newlines: 1,
    });

    let result = parser.parse(response, lines);

    assert_eq!(result.translated.len(), 1);
    assert_eq!(result.errors, vec![ValidationError::LineTooLong(vec![1])]);
}
