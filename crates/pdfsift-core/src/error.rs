//! Error types for the pdfsift-core library.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::registry::{ProviderId, Runtime};

/// Main error type for the pdfsift library.
#[derive(Error, Debug)]
pub enum SiftError {
    /// PDF loading or parsing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR recognition error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// A backend failed to initialize or is not installed.
    #[error("dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// The active provider does not implement the requested operation.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: ProviderId,
        operation: Operation,
    },

    /// The requested provider cannot be used in this runtime.
    #[error("provider '{provider}' is not available: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Input is larger than the configured maximum.
    #[error("file is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`SiftError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input is not a usable PDF.
    Format,
    /// A parser or OCR backend is missing or broken.
    Dependency,
    /// The provider lacks the capability.
    Unsupported,
    /// Registry rejected an explicit provider choice.
    ProviderUnavailable,
    /// Recognition failed at runtime.
    Ocr,
    /// I/O, image codec or configuration problem.
    Other,
}

impl SiftError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SiftError::Pdf(_) | SiftError::FileTooLarge { .. } => ErrorKind::Format,
            SiftError::Dependency(_) => ErrorKind::Dependency,
            SiftError::Unsupported { .. } => ErrorKind::Unsupported,
            SiftError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            SiftError::Ocr(_) => ErrorKind::Ocr,
            SiftError::Image(_) | SiftError::Io(_) | SiftError::Config(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn unsupported(provider: ProviderId, operation: Operation) -> Self {
        SiftError::Unsupported {
            provider,
            operation,
        }
    }

    pub(crate) fn unavailable(provider: impl fmt::Display, runtime: Runtime) -> Self {
        SiftError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: format!("not provided in the {} runtime", runtime),
        }
    }
}

/// Operations a provider may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    TextExtraction,
    ImageExtraction,
    Metadata,
    Ocr,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::TextExtraction => "text extraction",
            Operation::ImageExtraction => "image extraction",
            Operation::Metadata => "metadata extraction",
            Operation::Ocr => "OCR",
        };
        f.write_str(name)
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Input does not start with the `%PDF-` signature.
    #[error("missing %PDF- signature")]
    InvalidSignature,

    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be opened with an empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// Failed to extract text from a page.
    #[error("failed to extract text from page {page}: {reason}")]
    TextExtraction { page: u32, reason: String },

    /// Failed to extract images from a page.
    #[error("failed to extract images from page {page}: {reason}")]
    ImageExtraction { page: u32, reason: String },

    /// Provider-level failure that is not tied to one page.
    #[error("{0}")]
    Provider(String),
}

/// Errors related to OCR recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The engine does not handle this language.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Why a backend could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyFailure {
    /// Binary, model file or library is absent.
    NotInstalled,
    /// Present but failed to initialize.
    InitFailed,
    /// Initialized but failed while running.
    RuntimeFailure,
}

/// A parser or OCR backend failed to load.
///
/// Cloneable so one initialization outcome can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{dependency}: {message} ({reason:?})")]
pub struct DependencyError {
    pub dependency: String,
    pub reason: DependencyFailure,
    pub message: String,
}

impl DependencyError {
    pub fn not_installed(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            reason: DependencyFailure::NotInstalled,
            message: message.into(),
        }
    }

    pub fn init_failed(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            reason: DependencyFailure::InitFailed,
            message: message.into(),
        }
    }

    pub fn runtime(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            reason: DependencyFailure::RuntimeFailure,
            message: message.into(),
        }
    }
}

/// Result type for the pdfsift library.
pub type Result<T> = std::result::Result<T, SiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SiftError::from(PdfError::InvalidSignature).kind(),
            ErrorKind::Format
        );
        assert_eq!(
            SiftError::unsupported(ProviderId::Pdftotext, Operation::ImageExtraction).kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(
            SiftError::from(DependencyError::not_installed("tesseract", "missing")).kind(),
            ErrorKind::Dependency
        );
    }

    #[test]
    fn test_unsupported_message_names_provider() {
        let err = SiftError::unsupported(ProviderId::Pdftotext, Operation::ImageExtraction);
        assert_eq!(err.to_string(), "pdftotext does not support image extraction");
    }

    #[test]
    fn test_dependency_error_distinguishes_reason() {
        let missing = DependencyError::not_installed("tesseract", "binary not found");
        let broken = DependencyError::init_failed("onnx", "bad model");
        assert_eq!(missing.reason, DependencyFailure::NotInstalled);
        assert_eq!(broken.reason, DependencyFailure::InitFailed);
        assert_ne!(missing, broken);
    }
}
