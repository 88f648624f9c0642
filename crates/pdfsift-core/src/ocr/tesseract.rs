//! OCR through the `tesseract` command-line tool.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use super::{sort_by_reading_order, Detection, OcrProvider, OcrResult};
use crate::error::{DependencyError, OcrError, Result};
use crate::registry::ProviderId;
use crate::tools;

/// OCR provider that shells out to `tesseract <image> stdout -l <lang> tsv`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TesseractOcr;

impl TesseractOcr {
    pub fn new() -> Self {
        Self
    }

    fn recognize_one(
        &self,
        image: &DynamicImage,
        image_index: usize,
        language: &str,
    ) -> Result<Vec<Detection>> {
        let file = tempfile::Builder::new()
            .prefix("pdfsift-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(file.path(), ImageFormat::Png)?;

        let output = tools::run(
            "tesseract",
            [
                file.path().as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(language),
                OsStr::new("tsv"),
            ],
        )?;

        if !output.status.success() {
            let stderr = tools::stderr_of(&output);
            if stderr.contains("Failed loading language") {
                return Err(OcrError::UnsupportedLanguage(language.to_string()).into());
            }
            return Err(DependencyError::runtime("tesseract", stderr).into());
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let detections = parse_tsv(&tsv, image_index);
        debug!("tesseract: {} lines in image {}", detections.len(), image_index);
        Ok(detections)
    }
}

impl OcrProvider for TesseractOcr {
    fn id(&self) -> ProviderId {
        ProviderId::Tesseract
    }

    fn recognize(&self, images: &[DynamicImage], language: &str) -> Result<OcrResult> {
        let start = Instant::now();
        let mut detections = Vec::new();

        for (index, image) in images.iter().enumerate() {
            if image.width() == 0 || image.height() == 0 {
                return Err(OcrError::InvalidImage(format!("image {} is empty", index)).into());
            }
            detections.extend(self.recognize_one(image, index, language)?);
        }

        sort_by_reading_order(&mut detections);
        Ok(OcrResult::from_detections(
            detections,
            start.elapsed().as_millis() as u64,
        ))
    }
}

/// Words of one text line, accumulated from TSV rows.
#[derive(Default)]
struct LineAccumulator {
    words: Vec<String>,
    confidence_sum: f32,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl LineAccumulator {
    fn push(&mut self, word: &str, confidence: f32, (left, top, width, height): (f32, f32, f32, f32)) {
        if self.words.is_empty() {
            (self.left, self.top) = (left, top);
            (self.right, self.bottom) = (left + width, top + height);
        } else {
            self.left = self.left.min(left);
            self.top = self.top.min(top);
            self.right = self.right.max(left + width);
            self.bottom = self.bottom.max(top + height);
        }
        self.words.push(word.to_string());
        self.confidence_sum += confidence;
    }

    fn into_detection(self, image_index: usize) -> Detection {
        let confidence = self.confidence_sum / self.words.len() as f32;
        Detection::from_rect(
            self.words.join(" "),
            confidence,
            (self.left, self.top, self.right - self.left, self.bottom - self.top),
            image_index,
        )
    }
}

/// Parse `tesseract ... tsv` output into line-level detections.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only word rows (level 5) with a
/// non-negative confidence carry text.
fn parse_tsv(tsv: &str, image_index: usize) -> Vec<Detection> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), LineAccumulator> = BTreeMap::new();
    let mut rows = tsv.lines();

    match rows.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => {
            warn!("Unexpected tesseract output, expected a TSV header: {:?}", other);
            return Vec::new();
        }
        None => return Vec::new(),
    }

    for row in rows {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let text = cols[11].trim();
        let confidence: f32 = match cols[10].trim().parse() {
            Ok(c) if c >= 0.0 => c,
            _ => continue,
        };
        if text.is_empty() {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let coord = |i: usize| cols[i].trim().parse::<f32>().unwrap_or(0.0);

        let key = (num(1), num(2), num(3), num(4));

        lines
            .entry(key)
            .or_default()
            .push(text, confidence, (coord(6), coord(7), coord(8), coord(9)));
    }

    lines
        .into_values()
        .map(|line| line.into_detection(image_index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
4\t1\t1\t1\t1\t0\t40\t30\t300\t20\t-1\t
5\t1\t1\t1\t1\t1\t40\t30\t120\t20\t96.5\tQuarterly
5\t1\t1\t1\t1\t2\t170\t32\t90\t18\t91.5\treport
5\t1\t1\t1\t2\t1\t40\t70\t60\t20\t88\t2024
5\t1\t1\t1\t2\t2\t110\t70\t10\t20\t-1\t
";

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let detections = parse_tsv(TSV, 2);
        assert_eq!(detections.len(), 2);

        assert_eq!(detections[0].text, "Quarterly report");
        assert_eq!(detections[0].confidence, 94.0);
        assert_eq!(detections[0].rect(), (40.0, 30.0, 260.0, 50.0));
        assert_eq!(detections[0].image_index, 2);

        assert_eq!(detections[1].text, "2024");
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        assert!(parse_tsv("", 0).is_empty());
        assert!(parse_tsv("level\tpage_num\n", 0).is_empty());
    }
}
