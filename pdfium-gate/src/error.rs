//! Error types for pdfium-gate

use std::fmt;
use thiserror::Error;

/// Result type for pdfium-gate operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Fixed mapping from native error codes to their human-readable phrase.
const ERROR_PHRASES: &[(u32, &str)] = &[
    (0, "no error"),
    (1, "unknown error"),
    (2, "file not found or could not be opened"),
    (3, "file not in PDF format or corrupted"),
    (4, "password required or incorrect password"),
    (5, "unsupported security scheme"),
    (6, "page not found or content error"),
    (
        1001,
        "the requested operation cannot be completed due to a license restrictions",
    ),
];

/// Native code reported when a document needs a (different) password.
pub const ERROR_PASSWORD: u32 = 4;

/// Look up the phrase for a native error code.
///
/// Codes outside the table map to `"unknown error"`.
pub fn error_code_phrase(code: u32) -> &'static str {
    ERROR_PHRASES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, phrase)| *phrase)
        .unwrap_or("unknown error")
}

/// One input of a multi-document operation that the engine refused to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentLoadFailure {
    /// Position of the input in the caller's list (0 = primary).
    pub index: usize,
    /// Native error code.
    pub code: u32,
}

/// Snapshot of the engine's last-error side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastError {
    pub code: u32,
}

impl LastError {
    pub fn phrase(&self) -> &'static str {
        error_code_phrase(self.code)
    }

    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCode={}, ReasonPhrase={}", self.code, self.phrase())
    }
}

/// Error types for gated PDF operations
#[derive(Error, Debug)]
pub enum PdfError {
    /// Caller input rejected before any native call
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The engine refused to open a document
    #[error("Unable to load document: ErrorCode={code}, ReasonPhrase={}", phrase(.code))]
    LoadFailed { code: u32 },

    /// Some inputs of a multi-document operation could not be opened
    #[error("{} of {total} documents failed to load: {}", .failures.len(), describe_failures(.failures))]
    LoadDocumentsFailed {
        failures: Vec<DocumentLoadFailure>,
        total: usize,
    },

    /// Page index outside the document or the engine refused the page
    #[error("Unable to open page {index} (document has {count} pages)")]
    PageOpenFailed { index: usize, count: usize },

    /// Text handle for a loaded page could not be created
    #[error("Unable to open text for page {index}")]
    PageTextOpenFailed { index: usize },

    /// Version number outside the known set
    #[error("Unsupported PDF version number {0}")]
    UnsupportedVersion(i32),

    /// Engine could not report a file version (e.g. newly created document)
    #[error("PDF version is not available for this document")]
    VersionUnavailable,

    /// Rasterization failed
    #[error("Failed to render page {index}: {reason}")]
    RenderFailed { index: usize, reason: String },

    /// Page import into the merge target failed
    #[error("Failed to merge document {document_index}: {reason}")]
    MergeFailed {
        document_index: usize,
        reason: String,
    },

    /// Page import into the split target failed
    #[error("Failed to split pages `{range}`: {reason}")]
    SplitFailed { range: String, reason: String },

    /// Serialization to bytes failed
    #[error("Failed to save document: {reason}")]
    SaveFailed { reason: String },

    /// A page could not be built from a JPEG image
    #[error("Failed to import image {index}: {reason}")]
    ImageImportFailed { index: usize, reason: String },

    /// Malformed page-range expression
    #[error("Invalid page range `{sub_range}`: {reason}")]
    PageRangeFormat { sub_range: String, reason: String },

    /// Session (or handle) used after it was closed
    #[error("Session has already been disposed")]
    SessionDisposed,

    /// A library instance is already live in this process
    #[error("PDF library is already initialized")]
    AlreadyInitialized,

    /// The library was shut down while handles were still in use
    #[error("PDF library has been shut down")]
    LibraryShutDown,

    /// The gate was entered again from inside a gated call on the same thread
    #[error("Engine gate is already held by this thread")]
    GateReentered,

    /// Binding to the native shared library failed
    #[error("Failed to bind PDF library: {reason}")]
    BindFailed { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Native error code carried by load errors.
    pub fn native_code(&self) -> Option<u32> {
        match self {
            PdfError::LoadFailed { code } => Some(*code),
            PdfError::LoadDocumentsFailed { failures, .. } => failures.first().map(|f| f.code),
            _ => None,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PdfError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

fn phrase(code: &u32) -> &'static str {
    error_code_phrase(*code)
}

fn describe_failures(failures: &[DocumentLoadFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("#{} ({})", f.index, error_code_phrase(f.code)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_table() {
        assert_eq!(error_code_phrase(0), "no error");
        assert_eq!(error_code_phrase(4), "password required or incorrect password");
        assert_eq!(
            error_code_phrase(1001),
            "the requested operation cannot be completed due to a license restrictions"
        );
        assert_eq!(error_code_phrase(7), "unknown error");
        assert_eq!(error_code_phrase(u32::MAX), "unknown error");
    }

    #[test]
    fn test_load_failed_message() {
        let err = PdfError::LoadFailed { code: 3 };
        assert_eq!(
            err.to_string(),
            "Unable to load document: ErrorCode=3, ReasonPhrase=file not in PDF format or corrupted"
        );
        assert_eq!(err.native_code(), Some(3));
    }

    #[test]
    fn test_aggregated_load_failures() {
        let err = PdfError::LoadDocumentsFailed {
            failures: vec![
                DocumentLoadFailure { index: 1, code: 2 },
                DocumentLoadFailure { index: 3, code: 4 },
            ],
            total: 4,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 of 4 documents failed to load"));
        assert!(msg.contains("#3 (password required or incorrect password)"));
        assert_eq!(err.native_code(), Some(2));
    }

    #[test]
    fn test_last_error_display() {
        let last = LastError { code: 2 };
        assert!(last.is_error());
        assert_eq!(
            last.to_string(),
            "ErrorCode=2, ReasonPhrase=file not found or could not be opened"
        );
        assert!(!LastError { code: 0 }.is_error());
    }
}
