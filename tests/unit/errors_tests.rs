/*!
 * Tests for error types and conversions
 */

use subtrans::errors::{
    AppError, CommandError, DocumentError, ProviderError, QueueError, TranslationError, UndoError, ValidationError,
};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "Too many requests".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("429"));
    assert!(display.contains("Too many requests"));
}

#[test]
fn test_translationError_fromProviderError_shouldWrap() {
    let error: TranslationError = ProviderError::ConnectionError("Host unreachable".to_string()).into();
    assert!(matches!(error, TranslationError::Provider(_)));
    assert!(error.to_string().contains("Host unreachable"));
}

#[test]
fn test_commandError_shouldNameCommandAndCause() {
    let error = CommandError::document("MergeScenesCommand", DocumentError::SceneNotFound(7));

    assert_eq!(error.command(), "MergeScenesCommand");
    assert_eq!(error.to_string(), "MergeScenesCommand failed: Scene 7 not found");
}

#[test]
fn test_undoError_redo_shouldWrapCommandError() {
    let error: UndoError = CommandError::Aborted {
        command: "TranslateSceneCommand",
    }
    .into();
    assert_eq!(error.to_string(), "Redo failed: TranslateSceneCommand was aborted");
}

#[test]
fn test_documentError_nonContiguous_shouldListNumbers() {
    let error = DocumentError::NonContiguous {
        what: "Batch",
        numbers: vec![1, 3],
    };
    assert_eq!(error.to_string(), "Batch numbers must be a sorted contiguous run, got [1, 3]");
}

#[test]
fn test_validationError_shouldSerializeWithKind() -> anyhow::Result<()> {
    let json = serde_json::to_string(&ValidationError::UnmatchedLines(vec![4, 5]))?;
    assert_eq!(json, r#"{"kind":"UnmatchedLines","lines":[4,5]}"#);

    let parsed: ValidationError = serde_json::from_str(r#"{"kind":"NoTranslation"}"#)?;
    assert_eq!(parsed, ValidationError::NoTranslation);
    Ok(())
}

#[test]
fn test_appError_conversions_shouldPreserveMessages() {
    let app: AppError = QueueError::StopTimeout(250).into();
    assert_eq!(app.to_string(), "Queue error: Command queue did not stop within 250 ms");

    let app: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "lines.json").into();
    assert!(matches!(app, AppError::File(_)));

    let app: AppError = anyhow::anyhow!("Something odd").into();
    assert_eq!(app.to_string(), "Unknown error: Something odd");
}
