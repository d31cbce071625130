//! Error types for the invex-core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// LLM extraction error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Per-document processing failure.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

/// Errors from the LLM-backed field extractor.
///
/// Every variant is recoverable: the pipeline falls back to the
/// rule-based extractor when it sees one of these.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No credentials, provider unreachable, authentication rejected or timed out.
    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    /// The response was not valid JSON or lacked required keys.
    #[error("invalid LLM response: {0}")]
    ResponseInvalid(String),

    /// The provider answered but reported a content error.
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },
}

impl LlmError {
    /// Whether a clarifying retry can help with this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::ResponseInvalid(_))
    }
}

/// Fatal errors for a single document. A batch records these and moves on.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The bytes are not a readable PDF.
    #[error("unreadable PDF: {0}")]
    UnreadablePdf(String),

    /// Neither the text layer nor OCR produced usable text.
    #[error("no usable text could be extracted")]
    InsufficientText,

    /// Even the rule-based extractor found nothing.
    #[error("no invoice fields could be extracted")]
    NoFieldsExtracted,

    /// CSV output could not be persisted.
    #[error("failed to write output: {0}")]
    WriteFailure(String),
}

/// Serializable classification of a [`DocumentError`], used in job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentErrorKind {
    UnreadablePdf,
    InsufficientText,
    NoFieldsExtracted,
    WriteFailure,
}

impl DocumentError {
    pub fn kind(&self) -> DocumentErrorKind {
        match self {
            DocumentError::UnreadablePdf(_) => DocumentErrorKind::UnreadablePdf,
            DocumentError::InsufficientText => DocumentErrorKind::InsufficientText,
            DocumentError::NoFieldsExtracted => DocumentErrorKind::NoFieldsExtracted,
            DocumentError::WriteFailure(_) => DocumentErrorKind::WriteFailure,
        }
    }
}

impl From<PdfError> for DocumentError {
    fn from(err: PdfError) -> Self {
        DocumentError::UnreadablePdf(err.to_string())
    }
}

impl From<csv::Error> for DocumentError {
    fn from(err: csv::Error) -> Self {
        DocumentError::WriteFailure(err.to_string())
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(err: std::io::Error) -> Self {
        DocumentError::WriteFailure(err.to_string())
    }
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_error_kind() {
        assert_eq!(
            DocumentError::UnreadablePdf("bad header".into()).kind(),
            DocumentErrorKind::UnreadablePdf
        );
        assert_eq!(
            DocumentError::from(PdfError::NoPages).kind(),
            DocumentErrorKind::UnreadablePdf
        );
    }

    #[test]
    fn test_only_invalid_responses_are_retryable() {
        assert!(LlmError::ResponseInvalid("no json".into()).is_retryable());
        assert!(!LlmError::Unavailable("timeout".into()).is_retryable());
        assert!(!LlmError::Provider { status: 400, message: "blocked".into() }.is_retryable());
    }
}
