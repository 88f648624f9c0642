//! OCR command - recognize text in image files.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use pdfsift_core::{OcrOptions, OcrShape};

use super::{build_reader, print_json, run_blocking, spinner, write_output, OutputFormat, ReaderArgs};

/// Arguments for the ocr command.
#[derive(Args)]
pub struct OcrArgs {
    /// Input images (PNG, JPEG, TIFF, BMP)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Recognition language (Tesseract-style code)
    #[arg(short, long, default_value = "eng")]
    language: String,

    /// Drop detections below this confidence (0 - 100)
    #[arg(long, default_value = "0")]
    threshold: f32,

    /// Include per-detection boxes in JSON output
    #[arg(long)]
    detailed: bool,

    /// Upscale, grayscale and denoise before recognition
    #[arg(long)]
    enhance: bool,

    /// Output file for the recognized text (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

pub async fn run(args: OcrArgs, reader_args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let reader = build_reader(reader_args, config_path)?;

    let mut images = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let image = image::open(input)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", input.display(), e))?;
        images.push(image);
    }

    let options = OcrOptions {
        language: args.language.clone(),
        confidence_threshold: args.threshold,
        shape: if args.detailed { OcrShape::Detailed } else { OcrShape::Text },
        enhance: args.enhance,
    };

    let pb = spinner("Running OCR...");
    let worker = reader.clone();
    let result = run_blocking(&reader, move || worker.perform_ocr(&images, &options)).await?;
    pb.finish_and_clear();

    info!(
        "OCR finished in {}ms at {:.1}% confidence",
        result.processing_time_ms, result.confidence
    );

    match args.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => {
            write_output(&result.text, args.output.as_deref())?;
            eprintln!(
                "{} Confidence: {:.1}%, {}ms",
                style("ℹ").blue(),
                result.confidence,
                result.processing_time_ms
            );
        }
    }

    Ok(())
}
