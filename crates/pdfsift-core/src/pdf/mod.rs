//! PDF capability providers.
//!
//! A [`PdfProvider`] turns raw bytes into a [`LoadedPdf`], which answers
//! per-page questions (text, images) and document-level ones (metadata).
//! Providers declare what they implement through [`Capabilities`]; the
//! default trait methods report everything else as unsupported.

mod extractor;
mod metadata;
mod poppler;

pub use extractor::LopdfProvider;
pub use metadata::{decode_pdf_string, parse_pdf_date, Metadata};
pub use poppler::PdftotextProvider;

use std::fmt;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use serde::Serialize;
use tracing::debug;

use crate::error::{Operation, PdfError, Result, SiftError};
use crate::registry::ProviderId;

/// PDF files start with this signature.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Operations a provider implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub text: bool,
    pub images: bool,
    pub metadata: bool,
}

impl Capabilities {
    /// Whether `operation` is covered by these capabilities.
    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::TextExtraction => self.text,
            Operation::ImageExtraction => self.images,
            Operation::Metadata => self.metadata,
            Operation::Ocr => false,
        }
    }
}

/// Trait for PDF parsing backends.
pub trait PdfProvider: Send + Sync {
    /// Identifier of this provider.
    fn id(&self) -> ProviderId;

    /// Operations this provider implements.
    fn capabilities(&self) -> Capabilities;

    /// Parse a PDF held in memory.
    fn load(&self, data: &[u8]) -> Result<Box<dyn LoadedPdf>>;
}

/// A parsed document, as seen through one provider.
///
/// Page numbers are 1-based. Implementations validate them and return
/// [`PdfError::InvalidPage`] for anything outside `1..=page_count()`.
pub trait LoadedPdf: Send + Sync {
    /// Provider that produced this document.
    fn provider(&self) -> ProviderId;

    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Whether the file was encrypted (even if it opened with an empty password).
    fn is_encrypted(&self) -> bool;

    /// Extract the text layer of one page.
    fn page_text(&self, _page: u32, _preserve_layout: bool) -> Result<String> {
        Err(SiftError::unsupported(self.provider(), Operation::TextExtraction))
    }

    /// Extract the raster images placed on one page.
    fn page_images(&self, _page: u32) -> Result<Vec<DynamicImage>> {
        Err(SiftError::unsupported(self.provider(), Operation::ImageExtraction))
    }

    /// Read the document information dictionary.
    fn metadata(&self) -> Result<Metadata> {
        Err(SiftError::unsupported(self.provider(), Operation::Metadata))
    }
}

/// Check that `data` starts with the PDF signature.
pub fn check_signature(data: &[u8]) -> std::result::Result<(), PdfError> {
    if data.starts_with(PDF_SIGNATURE) {
        Ok(())
    } else {
        Err(PdfError::InvalidSignature)
    }
}

/// Where a document's bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory buffer.
    Buffer(Vec<u8>),
}

impl DocumentSource {
    pub fn path(path: impl AsRef<Path>) -> Self {
        DocumentSource::Path(path.as_ref().to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(data: Vec<u8>) -> Self {
        DocumentSource::Buffer(data)
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        DocumentSource::Path(path.to_path_buf())
    }
}

/// Where a loaded document came from, without its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum DocumentOrigin {
    Path(PathBuf),
    Buffer,
}

impl fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentOrigin::Path(path) => write!(f, "{}", path.display()),
            DocumentOrigin::Buffer => f.write_str("<buffer>"),
        }
    }
}

/// Handle to a loaded PDF.
///
/// Owned by a single caller; process another copy of the file for
/// concurrent work on the same document.
pub struct PdfDocument {
    origin: DocumentOrigin,
    page_count: u32,
    encrypted: bool,
    raw_size: u64,
    inner: Box<dyn LoadedPdf>,
}

impl PdfDocument {
    /// Validate the signature of `data` and load it with `provider`.
    pub fn load(provider: &dyn PdfProvider, origin: DocumentOrigin, data: &[u8]) -> Result<Self> {
        check_signature(data)?;
        let inner = provider.load(data)?;

        let doc = Self {
            origin,
            page_count: inner.page_count(),
            encrypted: inner.is_encrypted(),
            raw_size: data.len() as u64,
            inner,
        };

        debug!(
            "Loaded {} with {}: {} pages, {} bytes, encrypted={}",
            doc.origin, doc.inner.provider(), doc.page_count, doc.raw_size, doc.encrypted
        );

        Ok(doc)
    }

    pub fn origin(&self) -> &DocumentOrigin {
        &self.origin
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn raw_size(&self) -> u64 {
        self.raw_size
    }

    /// Provider-level view of the document.
    pub fn pages(&self) -> &dyn LoadedPdf {
        self.inner.as_ref()
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("origin", &self.origin)
            .field("provider", &self.inner.provider())
            .field("page_count", &self.page_count)
            .field("encrypted", &self.encrypted)
            .field("raw_size", &self.raw_size)
            .finish()
    }
}

/// A raster image extracted from a page.
#[derive(Debug, Clone, Serialize)]
pub struct PageImage {
    /// Page the image was placed on (1-indexed).
    pub page: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Channels per pixel (1 gray, 2 gray+alpha, 3 RGB, 4 RGBA).
    pub channels: u8,
    /// Interleaved 8-bit samples, row-major.
    #[serde(skip)]
    pub pixels: Vec<u8>,
}

impl PageImage {
    /// Capture `image` in its native channel layout, reduced to 8 bits.
    pub fn from_image(page: u32, image: &DynamicImage) -> Self {
        let channels = image.color().channel_count();
        let pixels = match channels {
            1 => image.to_luma8().into_raw(),
            2 => image.to_luma_alpha8().into_raw(),
            3 => image.to_rgb8().into_raw(),
            _ => image.to_rgba8().into_raw(),
        };

        Self {
            page,
            width: image.width(),
            height: image.height(),
            channels: channels.min(4),
            pixels,
        }
    }

    /// Rebuild an [`image::DynamicImage`] from the stored samples.
    pub fn to_image(&self) -> Option<DynamicImage> {
        let (w, h, data) = (self.width, self.height, self.pixels.clone());
        match self.channels {
            1 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            4 => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    #[test]
    fn test_check_signature() {
        assert!(check_signature(b"%PDF-1.7\n...").is_ok());
        assert!(matches!(
            check_signature(b"PK\x03\x04"),
            Err(PdfError::InvalidSignature)
        ));
        assert!(check_signature(b"").is_err());
    }

    #[test]
    fn test_capabilities_supports() {
        let caps = Capabilities {
            text: true,
            images: false,
            metadata: true,
        };
        assert!(caps.supports(Operation::TextExtraction));
        assert!(!caps.supports(Operation::ImageExtraction));
        assert!(!caps.supports(Operation::Ocr));
    }

    #[test]
    fn test_page_image_keeps_channel_layout() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 2, Luma([200])));
        let page_image = PageImage::from_image(3, &gray);

        assert_eq!(page_image.page, 3);
        assert_eq!((page_image.width, page_image.height), (4, 2));
        assert_eq!(page_image.channels, 1);
        assert_eq!(page_image.pixels.len(), 8);

        let back = page_image.to_image().unwrap();
        assert_eq!(back.to_luma8().get_pixel(3, 1)[0], 200);
    }
}
