//! Configuration for readers and providers.
//!
//! Two layers: [`SiftConfig`] is the JSON file with tuning knobs, and
//! [`Settings`] holds the flat options that can also come from the
//! environment. Explicit settings win over environment settings, which
//! win over built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiftError};
use crate::registry::ProviderId;

/// Default cap on input size: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default per-operation timeout for callers that enforce one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Main configuration for pdfsift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Flat options (providers, OCR switch, limits).
    pub settings: Settings,

    /// OCR backend configuration.
    pub ocr: OcrConfig,

    /// Document analysis thresholds.
    pub analysis: AnalysisConfig,
}

impl SiftConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SiftError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| SiftError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// OCR backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Language used for the fallback path.
    pub language: String,

    /// Directory containing the ONNX models.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens for glyphs outside the dictionary.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: crate::ocr::DEFAULT_LANGUAGE.to_string(),
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
        }
    }
}

impl OcrConfig {
    /// Full paths of the detection model, recognition model and dictionary.
    pub fn model_files(&self) -> [PathBuf; 3] {
        [
            self.model_dir.join(&self.detection_model),
            self.model_dir.join(&self.recognition_model),
            self.model_dir.join(&self.dictionary),
        ]
    }
}

/// Document analysis thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Pages sampled from the start of the document.
    pub sample_pages: u32,

    /// Non-whitespace characters a page needs to count as having text.
    pub min_page_text_chars: usize,

    /// Images with a shorter side below this are ignored (icons, rules).
    pub min_image_side: u32,

    /// Estimated direct extraction cost per page.
    pub text_ms_per_page: u64,

    /// Estimated OCR cost per page.
    pub ocr_ms_per_page: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_pages: 3,
            min_page_text_chars: 10,
            min_image_side: 32,
            text_ms_per_page: 50,
            ocr_ms_per_page: 2000,
        }
    }
}

/// Flat options. `None` means "not set at this layer".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parser provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,

    /// OCR provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_provider: Option<ProviderId>,

    /// Whether OCR (fallback and direct) is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_enabled: Option<bool>,

    /// Per-operation timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Maximum input size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
}

pub const ENV_PROVIDER: &str = "PDFSIFT_PROVIDER";
pub const ENV_OCR_PROVIDER: &str = "PDFSIFT_OCR_PROVIDER";
pub const ENV_OCR: &str = "PDFSIFT_OCR";
pub const ENV_TIMEOUT_MS: &str = "PDFSIFT_TIMEOUT_MS";
pub const ENV_MAX_FILE_SIZE: &str = "PDFSIFT_MAX_FILE_SIZE";

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        // non-UTF-8 variables cannot be ours
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Read settings from `PDFSIFT_*` key/value pairs. Empty values are unset.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Settings::default();

        for (key, value) in vars {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            match key.as_ref() {
                ENV_PROVIDER => settings.provider = Some(parse_provider(ENV_PROVIDER, value)?),
                ENV_OCR_PROVIDER => {
                    settings.ocr_provider = Some(parse_provider(ENV_OCR_PROVIDER, value)?)
                }
                ENV_OCR => settings.ocr_enabled = Some(parse_bool(ENV_OCR, value)?),
                ENV_TIMEOUT_MS => settings.timeout_ms = Some(parse_u64(ENV_TIMEOUT_MS, value)?),
                ENV_MAX_FILE_SIZE => {
                    settings.max_file_size = Some(parse_u64(ENV_MAX_FILE_SIZE, value)?)
                }
                _ => {}
            }
        }

        Ok(settings)
    }

    /// Fill every unset option from `fallback`.
    pub fn or(self, fallback: Settings) -> Settings {
        Settings {
            provider: self.provider.or(fallback.provider),
            ocr_provider: self.ocr_provider.or(fallback.ocr_provider),
            ocr_enabled: self.ocr_enabled.or(fallback.ocr_enabled),
            timeout_ms: self.timeout_ms.or(fallback.timeout_ms),
            max_file_size: self.max_file_size.or(fallback.max_file_size),
        }
    }

    pub fn ocr_enabled_or_default(&self) -> bool {
        self.ocr_enabled.unwrap_or(true)
    }

    pub fn timeout_ms_or_default(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn max_file_size_or_default(&self) -> u64 {
        self.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE)
    }
}

fn parse_provider(key: &str, value: &str) -> Result<ProviderId> {
    value
        .parse()
        .map_err(|_| SiftError::Config(format!("{}: unknown provider '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SiftError::Config(format!(
            "{}: expected a boolean, got '{}'",
            key, value
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        SiftError::Config(format!(
            "{}: expected a non-negative integer, got '{}'",
            key, value
        ))
    })
}
