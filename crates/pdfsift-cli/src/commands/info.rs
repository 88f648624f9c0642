//! Info command - analyze a PDF.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use serde::Serialize;

use pdfsift_core::{DocumentOrigin, PdfInfo, ProviderId};

use super::{build_reader, open_document, or_dash, print_json, run_blocking, spinner, OutputFormat, ReaderArgs};

/// Arguments for the info command.
#[derive(Args)]
pub struct InfoArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    source: &'a DocumentOrigin,
    provider: ProviderId,
    size_bytes: u64,
    #[serde(flatten)]
    info: &'a PdfInfo,
}

pub async fn run(args: InfoArgs, reader_args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let reader = build_reader(reader_args, config_path)?;
    let pb = spinner("Analyzing PDF...");

    let document = open_document(&reader, &args.input).await?;
    let worker = reader.clone();
    let doc = document.clone();
    let info = run_blocking(&reader, move || worker.get_info(&doc)).await?;

    pb.finish_and_clear();

    let report = InfoReport {
        source: document.origin(),
        provider: reader.provider_id(),
        size_bytes: document.raw_size(),
        info: &info,
    };

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_text(&report),
    }

    Ok(())
}

fn print_text(report: &InfoReport<'_>) {
    let info = report.info;

    println!("{} {}", style("File:").bold(), report.source);
    println!("  Provider:        {}", report.provider);
    println!("  Size:            {} bytes", report.size_bytes);
    println!("  Pages:           {}", info.page_count);
    println!("  Encrypted:       {}", info.encrypted);
    println!("  Title:           {}", or_dash(info.title.as_deref()));
    println!("  Author:          {}", or_dash(info.author.as_deref()));
    println!("  Embedded text:   {}", info.has_embedded_text);
    println!("  Images:          {}", info.has_images);
    println!("  OCR required:    {}", info.ocr_required);
    println!(
        "  Strategy:        {}",
        style(info.recommended_strategy).cyan().bold()
    );
    println!("  Est. text chars: {}", info.estimated_text_length);
    println!(
        "  Est. time:       {}ms",
        info.estimated_processing_time
            .for_strategy(info.recommended_strategy)
    );

    if !info.samples.is_empty() {
        println!();
        println!("{}", style("Sampled pages:").bold());
        for sample in &info.samples {
            println!(
                "  page {:>3}: {:>6} chars, {} images{}",
                sample.page,
                sample.text_length,
                sample.image_count,
                if sample.has_text { "" } else { " (no text)" }
            );
        }
    }
}
