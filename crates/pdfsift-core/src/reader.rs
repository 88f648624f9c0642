//! Extraction with OCR fallback.
//!
//! [`PdfReader`] is the entry point: it opens documents through the
//! selected parser provider, analyzes them, and extracts text, images and
//! metadata. Text extraction falls back to OCR of the page images when the
//! text layer is empty.

use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyzer::{DocumentAnalyzer, PdfInfo};
use crate::config::{OcrConfig, Settings, SiftConfig};
use crate::error::{ErrorKind, Operation, Result, SiftError};
use crate::ocr::{ImageEnhancer, OcrOptions, OcrProvider, OcrResult};
use crate::pdf::{
    Capabilities, DocumentOrigin, DocumentSource, Metadata, PageImage, PdfDocument, PdfProvider,
};
use crate::registry::{
    self, DependencyCheck, LazyProvider, OcrSlot, ProviderId, ProviderRegistry, ProviderRole,
    Runtime,
};

/// Options for [`PdfReader::extract_text`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextOptions {
    /// Pages to extract (1-indexed), in output order. `None` means all.
    /// Numbers outside the document are ignored.
    pub pages: Option<Vec<i64>>,

    /// Join pages with a single newline instead of a blank line.
    pub merge_pages: bool,

    /// Never fall back to OCR, even if the text layer is empty.
    pub skip_ocr_fallback: bool,

    /// Ask the provider to keep the page layout (column spacing).
    pub preserve_layout: bool,
}

impl TextOptions {
    fn separator(&self) -> &'static str {
        if self.merge_pages { "\n" } else { "\n\n" }
    }
}

/// Availability of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityStatus {
    pub available: bool,
    pub detail: String,
}

impl CapabilityStatus {
    fn yes(detail: impl Into<String>) -> Self {
        Self {
            available: true,
            detail: detail.into(),
        }
    }

    fn no(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            detail: detail.into(),
        }
    }
}

/// What a reader can do with its current providers.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    pub runtime: Runtime,
    pub parser: ProviderId,
    pub ocr_provider: Option<ProviderId>,
    pub text_extraction: CapabilityStatus,
    pub image_extraction: CapabilityStatus,
    pub metadata: CapabilityStatus,
    pub ocr: CapabilityStatus,
}

/// Installation state of every provider usable in the runtime.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
    pub runtime: Runtime,
    pub checks: Vec<DependencyCheck>,
}

impl DependencyStatus {
    /// Check for `id`, if it is part of this runtime.
    pub fn get(&self, id: ProviderId) -> Option<&DependencyCheck> {
        self.checks.iter().find(|c| c.provider == id)
    }

    pub fn all_available(&self) -> bool {
        self.checks.iter().all(|c| c.available)
    }
}

/// PDF reader with direct extraction and OCR fallback.
///
/// `Send + Sync`; one reader can serve many documents from many threads.
pub struct PdfReader {
    registry: ProviderRegistry,
    analyzer: DocumentAnalyzer,
    settings: Settings,
    ocr_config: OcrConfig,
    enhancer: ImageEnhancer,
}

impl PdfReader {
    /// Reader with built-in defaults; the environment is not consulted.
    pub fn new() -> Result<Self> {
        PdfReaderBuilder::new().build()
    }

    /// Reader configured from `PDFSIFT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        PdfReaderBuilder::from_env()?.build()
    }

    pub fn builder() -> PdfReaderBuilder {
        PdfReaderBuilder::new()
    }

    /// Effective settings after layering.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn provider_id(&self) -> ProviderId {
        self.registry.parser().id()
    }

    pub fn ocr_provider_id(&self) -> Option<ProviderId> {
        self.registry.ocr_id()
    }

    pub fn runtime(&self) -> Runtime {
        self.registry.runtime()
    }

    fn capabilities(&self) -> Capabilities {
        self.registry.parser().capabilities()
    }

    fn require(&self, operation: Operation) -> Result<()> {
        if self.capabilities().supports(operation) {
            Ok(())
        } else {
            Err(SiftError::unsupported(self.provider_id(), operation))
        }
    }

    /// Open a document from a path or an in-memory buffer.
    pub fn open(&self, source: impl Into<DocumentSource>) -> Result<PdfDocument> {
        let limit = self.settings.max_file_size_or_default();

        let (origin, data) = match source.into() {
            DocumentSource::Path(path) => {
                let size = std::fs::metadata(&path)?.len();
                check_size(size, limit)?;
                let data = std::fs::read(&path)?;
                (DocumentOrigin::Path(path), data)
            }
            DocumentSource::Buffer(data) => {
                check_size(data.len() as u64, limit)?;
                (DocumentOrigin::Buffer, data)
            }
        };

        PdfDocument::load(self.registry.parser(), origin, &data)
    }

    /// Analyze a document and recommend an extraction strategy.
    pub fn get_info(&self, document: &PdfDocument) -> Result<PdfInfo> {
        Ok(self.analyzer.analyze(document, self.capabilities()))
    }

    /// Extract text, falling back to OCR when the text layer is empty.
    ///
    /// Returns `Ok(None)` when nothing could be recovered.
    pub fn extract_text(&self, document: &PdfDocument, options: &TextOptions) -> Result<Option<String>> {
        self.require(Operation::TextExtraction)?;

        let pages = select_pages(options.pages.as_deref(), document.page_count());
        if pages.is_empty() {
            debug!("No valid pages selected from {}", document.origin());
            return Ok(None);
        }

        let separator = options.separator();
        let text = pages
            .iter()
            .map(|&page| match document.pages().page_text(page, options.preserve_layout) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("Text extraction failed on page {}: {}", page, e);
                    String::new()
                }
            })
            .collect::<Vec<_>>()
            .join(separator);

        if !text.trim().is_empty() {
            debug!("Extracted {} chars of embedded text from {} pages", text.len(), pages.len());
            return Ok(Some(text));
        }

        if options.skip_ocr_fallback || !self.settings.ocr_enabled_or_default() {
            debug!("Text layer empty, OCR fallback disabled");
            return Ok(None);
        }

        info!("Text layer empty on {} pages, falling back to OCR", pages.len());
        Ok(self.ocr_fallback(document, &pages, separator))
    }

    /// Recognize page images one page at a time.
    fn ocr_fallback(&self, document: &PdfDocument, pages: &[u32], separator: &str) -> Option<String> {
        if !self.capabilities().images {
            debug!("{} cannot extract page images; no OCR fallback", self.provider_id());
            return None;
        }

        let provider = match self.ocr_provider() {
            Ok(provider) => provider,
            Err(e) => {
                warn!("OCR fallback unavailable: {}", e);
                return None;
            }
        };

        let texts: Vec<String> = pages
            .iter()
            .map(|&page| self.ocr_page(provider.as_ref(), document, page))
            .collect();

        let text = texts.join(separator);
        if text.trim().is_empty() {
            debug!("OCR fallback produced no text");
            None
        } else {
            Some(text)
        }
    }

    fn ocr_page(&self, provider: &dyn OcrProvider, document: &PdfDocument, page: u32) -> String {
        let images = match document.pages().page_images(page) {
            Ok(images) => images,
            Err(e) => {
                warn!("Image extraction failed on page {}: {}", page, e);
                return String::new();
            }
        };

        if images.is_empty() {
            debug!("Page {} has no images to recognize", page);
            return String::new();
        }

        match provider.recognize(&images, &self.ocr_config.language) {
            Ok(result) => {
                debug!(
                    "Page {}: OCR recognized {} chars at {:.1}% confidence",
                    page,
                    result.text.len(),
                    result.confidence
                );
                result.text.trim().to_string()
            }
            Err(e) => {
                warn!("OCR failed on page {}: {}", page, e);
                String::new()
            }
        }
    }

    fn ocr_provider(&self) -> Result<Arc<dyn OcrProvider>> {
        let Some(lazy) = self.registry.ocr() else {
            return Err(SiftError::unsupported(self.provider_id(), Operation::Ocr));
        };
        Ok(lazy.get()?)
    }

    /// Read document metadata.
    ///
    /// Provider failures degrade to what the handle knows (page count and
    /// encryption); only an unsupported provider is an error.
    pub fn extract_metadata(&self, document: &PdfDocument) -> Result<Metadata> {
        self.require(Operation::Metadata)?;

        match document.pages().metadata() {
            Ok(metadata) => Ok(metadata),
            Err(e) if e.kind() == ErrorKind::Unsupported => Err(e),
            Err(e) => {
                warn!("Metadata extraction failed, using minimal metadata: {}", e);
                Ok(Metadata::minimal(document.page_count(), document.is_encrypted()))
            }
        }
    }

    /// Extract the raster images of every page.
    pub fn extract_images(&self, document: &PdfDocument) -> Result<Vec<PageImage>> {
        self.require(Operation::ImageExtraction)?;

        let mut images = Vec::new();
        for page in 1..=document.page_count() {
            match document.pages().page_images(page) {
                Ok(page_images) => images.extend(
                    page_images
                        .iter()
                        .map(|image| PageImage::from_image(page, image)),
                ),
                Err(e) => warn!("Image extraction failed on page {}: {}", page, e),
            }
        }

        debug!("Extracted {} images from {}", images.len(), document.origin());
        Ok(images)
    }

    /// Run OCR on caller-supplied images as one batch.
    pub fn perform_ocr(&self, images: &[DynamicImage], options: &OcrOptions) -> Result<OcrResult> {
        let provider = self.ocr_provider()?;

        let result = if options.enhance {
            let enhanced: Vec<DynamicImage> =
                images.iter().map(|image| self.enhancer.enhance(image)).collect();
            provider.recognize(&enhanced, &options.language)?
        } else {
            provider.recognize(images, &options.language)?
        };
        info!(
            "OCR: {} images, {} detections, {:.1}% confidence",
            images.len(),
            result.detections.len(),
            result.confidence
        );
        Ok(result.shaped(options))
    }

    /// Report which operations are usable. Never fails and does not
    /// initialize the OCR backend.
    pub fn check_capabilities(&self) -> CapabilityReport {
        let caps = self.capabilities();
        let parser = self.provider_id();

        let status = |supported: bool, operation: Operation| {
            if supported {
                CapabilityStatus::yes(format!("{} via {}", operation, parser))
            } else {
                CapabilityStatus::no(format!("{} does not support {}", parser, operation))
            }
        };

        CapabilityReport {
            runtime: self.runtime(),
            parser,
            ocr_provider: self.ocr_provider_id(),
            text_extraction: status(caps.text, Operation::TextExtraction),
            image_extraction: status(caps.images, Operation::ImageExtraction),
            metadata: status(caps.metadata, Operation::Metadata),
            ocr: self.ocr_status(),
        }
    }

    fn ocr_status(&self) -> CapabilityStatus {
        let (Some(id), Some(lazy)) = (self.registry.ocr_id(), self.registry.ocr()) else {
            return CapabilityStatus::no("OCR disabled");
        };

        if lazy.is_initialized() {
            return match lazy.get() {
                Ok(_) => CapabilityStatus::yes(format!("{} initialized", id)),
                Err(e) => CapabilityStatus::no(e.to_string()),
            };
        }

        let check = registry::probe(id, &self.ocr_config);
        CapabilityStatus {
            available: check.available,
            detail: check.detail,
        }
    }

    /// Probe every provider of the runtime without initializing any.
    pub fn check_dependencies(&self) -> DependencyStatus {
        let checks = self
            .registry
            .list_available()
            .into_iter()
            .map(|id| registry::probe(id, &self.ocr_config))
            .collect();

        DependencyStatus {
            runtime: self.runtime(),
            checks,
        }
    }
}

fn check_size(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        Err(SiftError::FileTooLarge { size, limit })
    } else {
        Ok(())
    }
}

/// Valid pages from `requested`, in request order; all pages when `None`.
fn select_pages(requested: Option<&[i64]>, page_count: u32) -> Vec<u32> {
    match requested {
        None => (1..=page_count).collect(),
        Some(pages) => pages
            .iter()
            .filter(|&&p| p >= 1 && p <= page_count as i64)
            .map(|&p| p as u32)
            .collect(),
    }
}

/// Builder for [`PdfReader`].
///
/// Each option resolves as explicit builder call, then environment, then
/// the config file, then the built-in default.
#[derive(Default)]
pub struct PdfReaderBuilder {
    config: SiftConfig,
    explicit: Settings,
    env: Settings,
    runtime: Option<Runtime>,
    parser: Option<Arc<dyn PdfProvider>>,
    ocr: Option<OcrSlot>,
}

impl PdfReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with the environment layer read from `PDFSIFT_*` variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new().env(Settings::from_env()?))
    }

    /// Use `config` for file-level settings, OCR and analysis options.
    pub fn config(mut self, config: SiftConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the environment layer.
    pub fn env(mut self, env: Settings) -> Self {
        self.env = env;
        self
    }

    /// Merge explicit settings over the ones already set.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.explicit = settings.or(self.explicit);
        self
    }

    pub fn provider(mut self, id: ProviderId) -> Self {
        self.explicit.provider = Some(id);
        self
    }

    pub fn ocr_provider(mut self, id: ProviderId) -> Self {
        self.explicit.ocr_provider = Some(id);
        self
    }

    pub fn ocr_enabled(mut self, enabled: bool) -> Self {
        self.explicit.ocr_enabled = Some(enabled);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.explicit.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.explicit.max_file_size = Some(bytes);
        self
    }

    /// Override runtime detection.
    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Use a custom parser provider instead of selecting one.
    pub fn with_parser(mut self, parser: Arc<dyn PdfProvider>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Use an already constructed OCR provider.
    pub fn with_ocr(self, provider: Arc<dyn OcrProvider>) -> Self {
        let id = provider.id();
        self.with_lazy_ocr(id, LazyProvider::new(format!("{} OCR backend", id), move || {
            Ok(provider.clone())
        }))
    }

    /// Use a custom lazily initialized OCR provider.
    pub fn with_lazy_ocr(mut self, id: ProviderId, provider: LazyProvider<dyn OcrProvider>) -> Self {
        self.ocr = Some(OcrSlot { id, provider });
        self
    }

    pub fn build(self) -> Result<PdfReader> {
        let runtime = self.runtime.unwrap_or_else(Runtime::detect);
        let defaults = self.env.clone().or(self.config.settings.clone());
        let settings = self.explicit.clone().or(defaults.clone());

        let parser = match self.parser {
            Some(parser) => parser,
            None => {
                let id = registry::select_provider(
                    ProviderRole::Parser,
                    self.explicit.provider,
                    defaults.provider,
                    runtime,
                )?;
                registry::create_parser(id)?
            }
        };

        let ocr = if !settings.ocr_enabled_or_default() {
            debug!("OCR disabled");
            None
        } else if let Some(slot) = self.ocr {
            Some(slot)
        } else {
            let id = registry::select_provider(
                ProviderRole::Ocr,
                self.explicit.ocr_provider,
                defaults.ocr_provider,
                runtime,
            )?;
            Some(OcrSlot {
                id,
                provider: registry::lazy_ocr(id, &self.config.ocr),
            })
        };

        let settings = Settings {
            provider: Some(parser.id()),
            ocr_provider: ocr.as_ref().map(|slot| slot.id),
            ..settings
        };

        Ok(PdfReader {
            registry: ProviderRegistry::new(runtime, parser, ocr),
            analyzer: DocumentAnalyzer::new(self.config.analysis),
            settings,
            ocr_config: self.config.ocr,
            enhancer: ImageEnhancer::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_pages() {
        assert_eq!(select_pages(None, 3), vec![1, 2, 3]);
        assert_eq!(select_pages(Some(&[3, 1, 9][..]), 3), vec![3, 1]);
        assert!(select_pages(Some(&[0, -1, 9999][..]), 3).is_empty());
        assert!(select_pages(None, 0).is_empty());
    }

    #[test]
    fn test_separator() {
        let merged = TextOptions {
            merge_pages: true,
            ..Default::default()
        };
        assert_eq!(merged.separator(), "\n");
        assert_eq!(TextOptions::default().separator(), "\n\n");
    }

    #[test]
    fn test_check_size() {
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(
            check_size(11, 10),
            Err(SiftError::FileTooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_builder_rejects_unavailable_ocr_provider() {
        let err = PdfReader::builder()
            .runtime(Runtime::Wasm)
            .ocr_provider(ProviderId::Tesseract)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert!(err.to_string().contains("tesseract"));
    }

    #[test]
    fn test_builder_rejects_env_provider_of_wrong_role() {
        let env = Settings {
            provider: Some(ProviderId::Onnx),
            ..Default::default()
        };
        assert!(PdfReader::builder().env(env).build().is_err());
    }

    #[test]
    fn test_builder_precedence() {
        let env = Settings {
            provider: Some(ProviderId::Pdftotext),
            max_file_size: Some(2048),
            ..Default::default()
        };
        let mut config = SiftConfig::default();
        config.settings.max_file_size = Some(1024);
        config.settings.timeout_ms = Some(5);

        let reader = PdfReader::builder()
            .config(config)
            .env(env)
            .provider(ProviderId::Lopdf)
            .ocr_enabled(false)
            .build()
            .unwrap();

        assert_eq!(reader.provider_id(), ProviderId::Lopdf);
        assert_eq!(reader.settings().max_file_size, Some(2048));
        assert_eq!(reader.settings().timeout_ms, Some(5));
        assert_eq!(reader.ocr_provider_id(), None);
    }

    #[test]
    fn test_ocr_disabled_is_unsupported() {
        let reader = PdfReader::builder().ocr_enabled(false).build().unwrap();
        let err = reader
            .perform_ocr(&[], &OcrOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(!reader.check_capabilities().ocr.available);
    }

    #[test]
    fn test_open_rejects_oversized_buffer() {
        let reader = PdfReader::builder()
            .max_file_size(8)
            .ocr_enabled(false)
            .build()
            .unwrap();
        let err = reader.open(b"%PDF-1.4 too long".to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_open_rejects_missing_signature() {
        let reader = PdfReader::builder().ocr_enabled(false).build().unwrap();
        let err = reader.open(b"GIF89a".to_vec()).unwrap_err();
        assert!(matches!(err, SiftError::Pdf(crate::error::PdfError::InvalidSignature)));
    }
}
