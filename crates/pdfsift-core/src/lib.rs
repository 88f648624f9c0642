//! Core library for pdfsift.
//!
//! This crate provides:
//! - PDF text, image and metadata extraction behind pluggable parser
//!   providers (lopdf/pdf-extract, poppler)
//! - OCR providers (PaddleOCR models via pure-onnx-ocr, tesseract)
//! - Document analysis that recommends text, OCR or hybrid extraction
//! - A reader that extracts text and falls back to OCR for scanned pages
//!
//! ```no_run
//! use pdfsift_core::{DocumentSource, PdfReader, TextOptions};
//!
//! # fn main() -> pdfsift_core::Result<()> {
//! let reader = PdfReader::from_env()?;
//! let document = reader.open(DocumentSource::path("scan.pdf"))?;
//! let info = reader.get_info(&document)?;
//! println!("{} pages, strategy {}", info.page_count, info.recommended_strategy);
//!
//! if let Some(text) = reader.extract_text(&document, &TextOptions::default())? {
//!     println!("{}", text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod ocr;
pub mod pdf;
pub mod reader;
pub mod registry;
mod tools;

pub use analyzer::{DocumentAnalyzer, PageSample, PdfInfo, ProcessingEstimate, Strategy};
pub use config::{AnalysisConfig, OcrConfig, Settings, SiftConfig};
pub use error::{
    DependencyError, DependencyFailure, ErrorKind, OcrError, Operation, PdfError, Result,
    SiftError,
};
pub use ocr::{Detection, OcrOptions, OcrProvider, OcrResult, OcrShape};
pub use pdf::{
    Capabilities, DocumentOrigin, DocumentSource, LoadedPdf, Metadata, PageImage, PdfDocument,
    PdfProvider,
};
pub use reader::{
    CapabilityReport, CapabilityStatus, DependencyStatus, PdfReader, PdfReaderBuilder,
    TextOptions,
};
pub use registry::{LazyProvider, ProviderId, ProviderRole, Runtime};
