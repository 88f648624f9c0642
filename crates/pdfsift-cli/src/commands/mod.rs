//! Subcommands and the helpers they share.

pub mod config;
pub mod images;
pub mod info;
pub mod metadata;
pub mod ocr;
pub mod providers;
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::debug;

use pdfsift_core::{PdfDocument, PdfReader, PdfReaderBuilder, ProviderId, SiftConfig};

/// Reader options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ReaderArgs {
    /// PDF parser provider (lopdf, pdftotext)
    #[arg(long, global = true, value_parser = parse_provider)]
    provider: Option<ProviderId>,

    /// OCR provider (onnx, tesseract)
    #[arg(long, global = true, value_parser = parse_provider)]
    ocr_provider: Option<ProviderId>,

    /// Disable OCR, including the fallback for scanned pages
    #[arg(long, global = true)]
    no_ocr: bool,

    /// Abandon an operation after this many milliseconds (0 = no limit)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Refuse files larger than this many bytes
    #[arg(long, global = true)]
    max_file_size: Option<u64>,
}

fn parse_provider(value: &str) -> Result<ProviderId, String> {
    value.parse().map_err(|e: pdfsift_core::SiftError| e.to_string())
}

/// Output format for structured results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    #[default]
    Text,
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdfsift")
        .join("config.json")
}

/// Load the config file: the explicit path must exist, the default one may not.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SiftConfig> {
    match path {
        Some(path) => Ok(SiftConfig::from_file(path)?),
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                Ok(SiftConfig::from_file(&default_path)?)
            } else {
                Ok(SiftConfig::default())
            }
        }
    }
}

/// Build a reader: command line over environment over config file.
pub fn build_reader(args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<Arc<PdfReader>> {
    let config = load_config(config_path)?;
    let mut builder = PdfReaderBuilder::from_env()?.config(config);

    if let Some(provider) = args.provider {
        builder = builder.provider(provider);
    }
    if let Some(provider) = args.ocr_provider {
        builder = builder.ocr_provider(provider);
    }
    if args.no_ocr {
        builder = builder.ocr_enabled(false);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        builder = builder.timeout_ms(timeout_ms);
    }
    if let Some(bytes) = args.max_file_size {
        builder = builder.max_file_size(bytes);
    }

    Ok(Arc::new(builder.build()?))
}

/// Run blocking library work off the async runtime, bounded by the
/// reader's timeout.
///
/// On timeout the worker thread is abandoned, not cancelled.
pub async fn run_blocking<T, F>(reader: &PdfReader, work: F) -> anyhow::Result<T>
where
    F: FnOnce() -> pdfsift_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let timeout_ms = reader.settings().timeout_ms_or_default();
    let task = tokio::task::spawn_blocking(work);

    if timeout_ms == 0 {
        return Ok(task.await??);
    }

    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(joined) => Ok(joined??),
        Err(_) => anyhow::bail!("Operation timed out after {}ms", timeout_ms),
    }
}

/// Open `input` on a blocking thread.
pub async fn open_document(reader: &Arc<PdfReader>, input: &Path) -> anyhow::Result<Arc<PdfDocument>> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let worker = reader.clone();
    let path = input.to_path_buf();
    let document = run_blocking(reader, move || worker.open(path)).await?;
    Ok(Arc::new(document))
}

/// Spinner on stderr; hidden when stderr is not a terminal.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write `output` to a file, or stdout when no path is given.
pub fn write_output(output: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output)?;
            eprintln!(
                "{} Output written to {}",
                style("✓").green(),
                path.display()
            );
        }
        None => println!("{}", output),
    }
    Ok(())
}

/// Format an optional value for text output.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
