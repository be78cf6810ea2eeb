/*!
 * Batch validation.
 *
 * This module provides the single entry point used to check a translated
 * batch. Validation is a pure function of the batch: the resulting faults
 * are stored on the batch as data and never abort a command.
 */

use log::warn;

use crate::app_config::ParserConfig;
use crate::errors::ValidationError;
use crate::subtitles::SubtitleBatch;

use super::length::LengthValidator;

/// Validator for whole batches
#[derive(Debug, Clone, Default)]
pub struct BatchValidator {
    length: LengthValidator,
}

impl BatchValidator {
    /// Create a validator with the given limits
    pub fn new(config: ParserConfig) -> Self {
        Self {
            length: LengthValidator::new(config),
        }
    }

    /// Check a batch's translations.
    ///
    /// A batch without any translation reports only `NoTranslation`.
    pub fn validate_batch(&self, batch: &SubtitleBatch) -> Vec<ValidationError> {
        if batch.translated.is_empty() {
            return vec![ValidationError::NoTranslation];
        }

        let mut errors = Vec::new();

        let unmatched: Vec<usize> = batch
            .originals
            .iter()
            .filter(|line| batch.get_translated(line.number).is_none())
            .map(|line| line.number)
            .collect();
        if !unmatched.is_empty() {
            errors.push(ValidationError::UnmatchedLines(unmatched));
        }

        errors.extend(self.length.validate_lines(&batch.translated));

        let orphaned = batch.orphaned_translations();
        if !orphaned.is_empty() {
            errors.push(ValidationError::OrphanedTranslations(orphaned));
        }

        if !errors.is_empty() {
            warn!(
                "Batch ({},{}) has {} validation faults",
                batch.scene,
                batch.number,
                errors.len()
            );
        }
        errors
    }
}
