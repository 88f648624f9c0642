//! Strategy selection from a sample of pages.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::pdf::{Capabilities, PdfDocument};

/// How a document should be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// The text layer covers the document.
    Text,
    /// Scanned or otherwise textless; recognize the page images.
    Ocr,
    /// Text on some pages, images on some; extract text and OCR the rest.
    Hybrid,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Text => f.write_str("text"),
            Strategy::Ocr => f.write_str("ocr"),
            Strategy::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// What was observed on one sampled page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSample {
    /// Page number (1-indexed).
    pub page: u32,
    pub has_text: bool,
    /// Characters in the trimmed page text.
    pub text_length: usize,
    /// Images of extraction-relevant size.
    pub image_count: usize,
}

impl PageSample {
    fn blank(page: u32) -> Self {
        Self {
            page,
            has_text: false,
            text_length: 0,
            image_count: 0,
        }
    }
}

/// Rough cost of each strategy for the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingEstimate {
    pub text_ms: u64,
    pub ocr_ms: u64,
    pub hybrid_ms: u64,
}

impl ProcessingEstimate {
    /// Estimate for `strategy`.
    pub fn for_strategy(&self, strategy: Strategy) -> u64 {
        match strategy {
            Strategy::Text => self.text_ms,
            Strategy::Ocr => self.ocr_ms,
            Strategy::Hybrid => self.hybrid_ms,
        }
    }
}

/// Analysis of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfInfo {
    pub page_count: u32,
    pub has_embedded_text: bool,
    pub has_images: bool,
    /// Set only when no sampled page has usable text.
    pub ocr_required: bool,
    pub recommended_strategy: Strategy,
    /// Extrapolated from the sampled pages.
    pub estimated_text_length: usize,
    pub estimated_processing_time: ProcessingEstimate,
    pub title: Option<String>,
    pub author: Option<String>,
    pub encrypted: bool,
    pub samples: Vec<PageSample>,
}

/// Samples the first pages of a document and recommends a [`Strategy`].
#[derive(Debug, Clone, Default)]
pub struct DocumentAnalyzer {
    config: AnalysisConfig,
}

impl DocumentAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze `document` using the operations in `capabilities`.
    ///
    /// Never fails: a page that cannot be read is recorded as having
    /// neither text nor images.
    pub fn analyze(&self, document: &PdfDocument, capabilities: Capabilities) -> PdfInfo {
        let page_count = document.page_count();
        let sample_count = self.config.sample_pages.min(page_count);

        let samples: Vec<PageSample> = (1..=sample_count)
            .map(|page| self.sample_page(document, page, capabilities))
            .collect();

        let has_embedded_text = samples.iter().any(|s| s.has_text);
        let all_text = !samples.is_empty() && samples.iter().all(|s| s.has_text);
        let has_images = samples.iter().any(|s| s.image_count > 0);

        let (recommended_strategy, ocr_required) = classify(has_embedded_text, all_text, has_images);

        let estimated_text_length = if samples.is_empty() {
            0
        } else {
            let total: usize = samples.iter().map(|s| s.text_length).sum();
            let mean = total as f64 / samples.len() as f64;
            (mean * page_count as f64).round() as usize
        };

        let pages = page_count as u64;
        let text_ms = pages * self.config.text_ms_per_page;
        let ocr_ms = pages * self.config.ocr_ms_per_page;

        let (title, author) = if capabilities.metadata {
            match document.pages().metadata() {
                Ok(metadata) => (metadata.title, metadata.author),
                Err(e) => {
                    debug!("Metadata unavailable during analysis: {}", e);
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        debug!(
            "Analysis of {}: sampled {} of {} pages, text={}, images={} -> {}",
            document.origin(),
            samples.len(),
            page_count,
            has_embedded_text,
            has_images,
            recommended_strategy
        );

        PdfInfo {
            page_count,
            has_embedded_text,
            has_images,
            ocr_required,
            recommended_strategy,
            estimated_text_length,
            estimated_processing_time: ProcessingEstimate {
                text_ms,
                ocr_ms,
                hybrid_ms: text_ms + ocr_ms,
            },
            title,
            author,
            encrypted: document.is_encrypted(),
            samples,
        }
    }

    /// A failing signal stays empty without discarding the other one.
    fn sample_page(&self, document: &PdfDocument, page: u32, capabilities: Capabilities) -> PageSample {
        let pages = document.pages();
        let mut sample = PageSample::blank(page);

        if capabilities.text {
            match pages.page_text(page, false) {
                Ok(text) => {
                    let trimmed = text.trim();
                    sample.text_length = trimmed.chars().count();
                    sample.has_text = trimmed.chars().filter(|c| !c.is_whitespace()).count()
                        >= self.config.min_page_text_chars;
                }
                Err(e) => warn!("Could not sample text on page {}: {}", page, e),
            }
        }

        if capabilities.images {
            match pages.page_images(page) {
                Ok(images) => {
                    sample.image_count = images
                        .iter()
                        .filter(|img| img.width().min(img.height()) >= self.config.min_image_side)
                        .count();
                }
                Err(e) => warn!("Could not sample images on page {}: {}", page, e),
            }
        }

        sample
    }
}

/// Pick a strategy from aggregated page signals.
///
/// A document with no text and no images still goes to OCR: its text may
/// be drawn as vector outlines, which only recognition can recover.
fn classify(any_text: bool, all_text: bool, any_images: bool) -> (Strategy, bool) {
    match (any_text, all_text, any_images) {
        (false, _, _) => (Strategy::Ocr, true),
        (true, true, false) => (Strategy::Text, false),
        _ => (Strategy::Hybrid, false),
    }
}
