//! PaddleOCR models run by `pure-onnx-ocr` (pure Rust, no ONNX Runtime).

use std::sync::Mutex;
use std::time::Instant;

use image::DynamicImage;
use pure_onnx_ocr::engine::{OcrEngine, OcrEngineBuilder};
use tracing::{debug, info};

use super::{sort_by_reading_order, Detection, OcrProvider, OcrResult};
use crate::config::OcrConfig;
use crate::error::{DependencyError, OcrError, Result};
use crate::registry::ProviderId;

/// Languages the bundled latin recognition model covers.
const LATIN_LANGUAGES: &[&str] = &[
    "eng", "en", "pol", "pl", "deu", "de", "fra", "fr", "spa", "es", "ita", "it", "por", "pt",
    "nld", "nl", "latin",
];

/// OCR provider backed by PaddleOCR detection and recognition models.
pub struct OnnxOcr {
    // The engine keeps mutable inference state; one recognition at a time.
    engine: Mutex<OcrEngine>,
    keep_unk: bool,
}

impl OnnxOcr {
    /// Load the models named by `config`.
    pub fn from_config(config: &OcrConfig) -> std::result::Result<Self, DependencyError> {
        let [det_path, rec_path, dict_path] = config.model_files();

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(DependencyError::not_installed(
                    "onnx",
                    format!("model file not found: {}", path.display()),
                ));
            }
        }

        let engine = OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| DependencyError::init_failed("onnx", format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", config.model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            keep_unk: config.keep_unk,
        })
    }

    fn clean_text(&self, text: &str) -> String {
        if self.keep_unk {
            text.to_string()
        } else {
            strip_unk(text)
        }
    }
}

impl OcrProvider for OnnxOcr {
    fn id(&self) -> ProviderId {
        ProviderId::Onnx
    }

    fn recognize(&self, images: &[DynamicImage], language: &str) -> Result<OcrResult> {
        if !supports_language(language) {
            return Err(OcrError::UnsupportedLanguage(language.to_string()).into());
        }

        let start = Instant::now();
        let engine = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("OCR engine lock poisoned".to_string()))?;

        let mut detections = Vec::new();
        for (image_index, image) in images.iter().enumerate() {
            if image.width() == 0 || image.height() == 0 {
                return Err(OcrError::InvalidImage(format!("image {} is empty", image_index)).into());
            }

            debug!("Recognizing image {}: {}x{}", image_index, image.width(), image.height());

            let results = engine
                .run_from_image(image)
                .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

            debug!("pure-onnx-ocr returned {} text regions", results.len());

            detections.extend(results.iter().map(|r| Detection {
                text: self.clean_text(&r.text),
                confidence: (r.confidence * 100.0).clamp(0.0, 100.0),
                bbox: polygon_to_bbox(&r.bounding_box),
                image_index,
            }));
        }

        sort_by_reading_order(&mut detections);
        let result = OcrResult::from_detections(detections, start.elapsed().as_millis() as u64);

        info!(
            "OCR complete: {} detections from {} images in {}ms",
            result.detections.len(),
            images.len(),
            result.processing_time_ms
        );

        Ok(result)
    }
}

fn supports_language(language: &str) -> bool {
    let language = language.trim().to_lowercase();
    // Tesseract-style multi-language codes such as "eng+pol"
    language
        .split('+')
        .all(|code| LATIN_LANGUAGES.contains(&code))
}

/// Replace unknown-glyph tokens and collapse the spaces they leave.
fn strip_unk(text: &str) -> String {
    text.replace("[UNK]", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert a `Polygon<f64>` to our `[f32; 8]` quadrilateral.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
