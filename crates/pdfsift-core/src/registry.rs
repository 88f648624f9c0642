//! Provider discovery and selection.
//!
//! Which providers exist is a static table keyed by [`Runtime`]. The
//! [`ProviderRegistry`] owns the provider instances; OCR backends are
//! expensive to load and sit behind a [`LazyProvider`] so the first use
//! initializes them exactly once.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DependencyError, Result, SiftError};
use crate::config::OcrConfig;
use crate::ocr::{OcrProvider, TesseractOcr};
use crate::pdf::{LopdfProvider, PdfProvider, PdftotextProvider};
use crate::tools;

/// Identifier of a parser or OCR provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Pure Rust parsing with lopdf.
    Lopdf,
    /// poppler's pdftotext/pdfinfo binaries.
    Pdftotext,
    /// PaddleOCR models run by pure-onnx-ocr.
    Onnx,
    /// The tesseract binary.
    Tesseract,
}

/// What a provider is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    Parser,
    Ocr,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Lopdf,
        ProviderId::Pdftotext,
        ProviderId::Onnx,
        ProviderId::Tesseract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Lopdf => "lopdf",
            ProviderId::Pdftotext => "pdftotext",
            ProviderId::Onnx => "onnx",
            ProviderId::Tesseract => "tesseract",
        }
    }

    pub fn role(&self) -> ProviderRole {
        match self {
            ProviderId::Lopdf | ProviderId::Pdftotext => ProviderRole::Parser,
            ProviderId::Onnx | ProviderId::Tesseract => ProviderRole::Ocr,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lopdf" => Ok(ProviderId::Lopdf),
            "pdftotext" | "poppler" => Ok(ProviderId::Pdftotext),
            "onnx" | "paddle" | "paddleocr" => Ok(ProviderId::Onnx),
            "tesseract" => Ok(ProviderId::Tesseract),
            other => Err(SiftError::ProviderUnavailable {
                provider: other.to_string(),
                reason: "unknown provider".to_string(),
            }),
        }
    }
}

/// Execution environment the providers must run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// Native process with filesystem and subprocess access.
    Native,
    /// WebAssembly, no subprocesses.
    Wasm,
}

impl Runtime {
    /// Runtime of the current compile target.
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Runtime::Wasm
        } else {
            Runtime::Native
        }
    }

    /// Providers usable in this runtime, in preference order.
    pub fn providers(&self) -> &'static [ProviderId] {
        match self {
            #[cfg(feature = "native")]
            Runtime::Native => &[
                ProviderId::Lopdf,
                ProviderId::Pdftotext,
                ProviderId::Onnx,
                ProviderId::Tesseract,
            ],
            #[cfg(not(feature = "native"))]
            Runtime::Native => &[ProviderId::Lopdf, ProviderId::Pdftotext, ProviderId::Tesseract],
            Runtime::Wasm => &[ProviderId::Lopdf],
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::Native => f.write_str("native"),
            Runtime::Wasm => f.write_str("wasm"),
        }
    }
}

/// All providers usable in `runtime`.
pub fn list_available(runtime: Runtime) -> BTreeSet<ProviderId> {
    runtime.providers().iter().copied().collect()
}

/// Whether `id` is usable in `runtime`.
pub fn is_available(id: ProviderId, runtime: Runtime) -> bool {
    runtime.providers().contains(&id)
}

/// Pick a provider for `role`.
///
/// An explicit request wins over the environment default, which wins over
/// the runtime's first provider for that role. A named provider that does
/// not fit is an error; nothing is substituted for it.
pub fn select_provider(
    role: ProviderRole,
    requested: Option<ProviderId>,
    env_default: Option<ProviderId>,
    runtime: Runtime,
) -> Result<ProviderId> {
    if let Some(id) = requested.or(env_default) {
        if id.role() != role {
            return Err(SiftError::ProviderUnavailable {
                provider: id.to_string(),
                reason: format!("not a {:?} provider", role).to_lowercase(),
            });
        }
        if !is_available(id, runtime) {
            return Err(SiftError::unavailable(id, runtime));
        }
        return Ok(id);
    }

    runtime
        .providers()
        .iter()
        .copied()
        .find(|id| id.role() == role)
        .ok_or_else(|| SiftError::ProviderUnavailable {
            provider: format!("{:?}", role).to_lowercase(),
            reason: format!("no provider for this role in the {} runtime", runtime),
        })
}

/// A provider created on first use.
///
/// Concurrent first callers block on the same initialization; its outcome,
/// success or failure, is stored and returned to every later caller.
pub struct LazyProvider<T: ?Sized> {
    name: String,
    cell: OnceLock<std::result::Result<Arc<T>, DependencyError>>,
    init: Box<dyn Fn() -> std::result::Result<Arc<T>, DependencyError> + Send + Sync>,
}

impl<T: ?Sized> LazyProvider<T> {
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> std::result::Result<Arc<T>, DependencyError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceLock::new(),
            init: Box::new(init),
        }
    }

    /// Get the provider, initializing it if this is the first call.
    pub fn get(&self) -> std::result::Result<Arc<T>, DependencyError> {
        self.cell
            .get_or_init(|| {
                info!("Initializing {}", self.name);
                let outcome = (self.init)();
                if let Err(e) = &outcome {
                    warn!("Failed to initialize {}: {}", self.name, e);
                }
                outcome
            })
            .clone()
    }

    /// Whether initialization has already run.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Result of probing a backend without initializing it.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyCheck {
    pub provider: ProviderId,
    pub available: bool,
    pub detail: String,
}

/// Check whether a provider's backend is installed.
pub fn probe(id: ProviderId, ocr: &OcrConfig) -> DependencyCheck {
    let outcome = match id {
        ProviderId::Lopdf => Ok("built in".to_string()),
        ProviderId::Pdftotext => tools::check_binary("pdftotext", "-v")
            .and_then(|v| tools::check_binary("pdfinfo", "-v").map(|_| v)),
        ProviderId::Tesseract => tools::check_binary("tesseract", "--version"),
        ProviderId::Onnx => probe_onnx(ocr),
    };

    match outcome {
        Ok(detail) => DependencyCheck {
            provider: id,
            available: true,
            detail,
        },
        Err(e) => DependencyCheck {
            provider: id,
            available: false,
            detail: e.to_string(),
        },
    }
}

#[cfg(feature = "native")]
fn probe_onnx(ocr: &OcrConfig) -> std::result::Result<String, DependencyError> {
    let missing: Vec<String> = ocr
        .model_files()
        .into_iter()
        .filter(|path| !path.exists())
        .map(|path| path.display().to_string())
        .collect();

    if missing.is_empty() {
        Ok(format!("models in {}", ocr.model_dir.display()))
    } else {
        Err(DependencyError::not_installed(
            "onnx",
            format!("missing model files: {}", missing.join(", ")),
        ))
    }
}

#[cfg(not(feature = "native"))]
fn probe_onnx(_ocr: &OcrConfig) -> std::result::Result<String, DependencyError> {
    Err(DependencyError::not_installed(
        "onnx",
        "built without the `native` feature",
    ))
}

/// Build the OCR backend for `id`. Runs inside [`LazyProvider::get`].
#[cfg_attr(not(feature = "native"), allow(unused_variables))]
fn create_ocr(id: ProviderId, config: &OcrConfig) -> std::result::Result<Arc<dyn OcrProvider>, DependencyError> {
    match id {
        ProviderId::Tesseract => {
            let version = tools::check_binary("tesseract", "--version")?;
            debug!("Using {}", version);
            Ok(Arc::new(TesseractOcr::new()))
        }
        #[cfg(feature = "native")]
        ProviderId::Onnx => Ok(Arc::new(crate::ocr::OnnxOcr::from_config(config)?)),
        other => Err(DependencyError::not_installed(
            other.as_str(),
            "not an OCR backend in this build",
        )),
    }
}

/// Create the parser provider for `id`.
pub fn create_parser(id: ProviderId) -> Result<Arc<dyn PdfProvider>> {
    match id {
        ProviderId::Lopdf => Ok(Arc::new(LopdfProvider::new())),
        ProviderId::Pdftotext => Ok(Arc::new(PdftotextProvider::new())),
        other => Err(SiftError::ProviderUnavailable {
            provider: other.to_string(),
            reason: "not a parser provider".to_string(),
        }),
    }
}

/// Lazily initialized OCR backend for `id`.
pub fn lazy_ocr(id: ProviderId, config: &OcrConfig) -> LazyProvider<dyn OcrProvider> {
    let config = config.clone();
    LazyProvider::new(format!("{} OCR backend", id), move || create_ocr(id, &config))
}

/// OCR slot of a registry: which backend, and its lazy instance.
pub struct OcrSlot {
    pub id: ProviderId,
    pub provider: LazyProvider<dyn OcrProvider>,
}

/// Owns the provider instances used by a reader.
pub struct ProviderRegistry {
    runtime: Runtime,
    parser: Arc<dyn PdfProvider>,
    ocr: Option<OcrSlot>,
}

impl ProviderRegistry {
    /// Registry over already selected providers. `ocr` is `None` when OCR
    /// is disabled.
    pub fn new(runtime: Runtime, parser: Arc<dyn PdfProvider>, ocr: Option<OcrSlot>) -> Self {
        debug!(
            "Provider registry: runtime={}, parser={}, ocr={:?}",
            runtime,
            parser.id(),
            ocr.as_ref().map(|slot| slot.id)
        );
        Self {
            runtime,
            parser,
            ocr,
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime
    }

    pub fn parser(&self) -> &dyn PdfProvider {
        self.parser.as_ref()
    }

    pub fn ocr_id(&self) -> Option<ProviderId> {
        self.ocr.as_ref().map(|slot| slot.id)
    }

    /// The lazily created OCR provider, if OCR is enabled.
    pub fn ocr(&self) -> Option<&LazyProvider<dyn OcrProvider>> {
        self.ocr.as_ref().map(|slot| &slot.provider)
    }

    pub fn list_available(&self) -> BTreeSet<ProviderId> {
        list_available(self.runtime)
    }

    pub fn is_available(&self, id: ProviderId) -> bool {
        is_available(id, self.runtime)
    }
}
