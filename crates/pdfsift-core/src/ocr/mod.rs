//! OCR providers and their shared result types.

mod enhance;
#[cfg(feature = "native")]
mod onnx;
mod tesseract;

pub use enhance::ImageEnhancer;
#[cfg(feature = "native")]
pub use onnx::OnnxOcr;
pub use tesseract::TesseractOcr;

use std::cmp::Ordering;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::ProviderId;

/// Language used when the caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Trait for OCR backends.
pub trait OcrProvider: Send + Sync {
    /// Identifier of this provider.
    fn id(&self) -> ProviderId;

    /// Recognize text in `images` as one batch.
    ///
    /// Detections carry the index of the image they came from and are
    /// ordered by image, then by reading order within the image.
    fn recognize(&self, images: &[DynamicImage], language: &str) -> Result<OcrResult>;
}

/// One recognized text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Recognized text.
    pub text: String,

    /// Confidence in percent (0 - 100).
    pub confidence: f32,

    /// Quadrilateral (x1, y1, x2, y2, x3, y3, x4, y4), clockwise from top-left.
    pub bbox: [f32; 8],

    /// Position of the source image in the recognized batch.
    pub image_index: usize,
}

impl Detection {
    /// Detection with an axis-aligned box.
    pub fn from_rect(
        text: impl Into<String>,
        confidence: f32,
        (left, top, width, height): (f32, f32, f32, f32),
        image_index: usize,
    ) -> Self {
        let (right, bottom) = (left + width, top + height);
        Self {
            text: text.into(),
            confidence,
            bbox: [left, top, right, top, right, bottom, left, bottom],
            image_index,
        }
    }

    /// Axis-aligned bounding rectangle (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Sort detections by image, then top-to-bottom in 20px rows, then left-to-right.
pub fn sort_by_reading_order(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect();
        let (bx, by, _, _) = b.rect();

        let row_a = (ay / 20.0) as i32;
        let row_b = (by / 20.0) as i32;

        a.image_index
            .cmp(&b.image_index)
            .then(row_a.cmp(&row_b))
            .then(ax.partial_cmp(&bx).unwrap_or(Ordering::Equal))
    });
}

/// Output of one recognition call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Detected text, one line per detection.
    pub text: String,

    /// Mean detection confidence in percent; 0 without detections.
    pub confidence: f32,

    /// Detections in output order. Empty for [`OcrShape::Text`].
    pub detections: Vec<Detection>,

    /// Wall-clock time spent recognizing.
    pub processing_time_ms: u64,
}

impl OcrResult {
    /// Build a result from ordered detections.
    pub fn from_detections(detections: Vec<Detection>, processing_time_ms: u64) -> Self {
        let text = detections
            .iter()
            .map(|d| d.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            text,
            confidence: mean_confidence(&detections),
            detections,
            processing_time_ms,
        }
    }

    pub fn empty() -> Self {
        Self::from_detections(Vec::new(), 0)
    }

    /// Whether recognition produced any non-whitespace text.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Apply caller options: drop low-confidence detections and, for the
    /// text shape, detections altogether. Text and confidence are kept.
    pub fn shaped(mut self, options: &OcrOptions) -> Self {
        match options.shape {
            OcrShape::Text => self.detections.clear(),
            OcrShape::Detailed => self
                .detections
                .retain(|d| d.confidence >= options.confidence_threshold),
        }
        self
    }
}

fn mean_confidence(detections: &[Detection]) -> f32 {
    if detections.is_empty() {
        return 0.0;
    }
    let sum: f32 = detections.iter().map(|d| d.confidence).sum();
    sum / detections.len() as f32
}

/// What a caller wants back from [`crate::PdfReader::perform_ocr`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrShape {
    /// Text and confidence only.
    Text,
    /// Text, confidence and per-detection boxes.
    #[default]
    Detailed,
}

/// Options for a direct OCR call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrOptions {
    /// Recognition language (Tesseract-style code, e.g. `eng`).
    pub language: String,

    /// Minimum detection confidence (0 - 100) kept in `detections`.
    pub confidence_threshold: f32,

    pub shape: OcrShape,

    /// Preprocess images before recognition.
    pub enhance: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            confidence_threshold: 0.0,
            shape: OcrShape::default(),
            enhance: false,
        }
    }
}
