//! Text command - extract text with OCR fallback.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use pdfsift_core::TextOptions;

use super::{build_reader, open_document, run_blocking, spinner, write_output, ReaderArgs};

/// Arguments for the text command.
#[derive(Args)]
pub struct TextArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pages to extract, comma separated (1-indexed; others are ignored)
    #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
    pages: Option<Vec<i64>>,

    /// Separate pages with a single newline instead of a blank line
    #[arg(long)]
    merge: bool,

    /// Do not fall back to OCR when the text layer is empty
    #[arg(long)]
    no_fallback: bool,

    /// Keep the page layout (column spacing)
    #[arg(long)]
    layout: bool,
}

pub async fn run(args: TextArgs, reader_args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let reader = build_reader(reader_args, config_path)?;
    let pb = spinner("Extracting text...");

    let document = open_document(&reader, &args.input).await?;

    let options = TextOptions {
        pages: args.pages,
        merge_pages: args.merge,
        skip_ocr_fallback: args.no_fallback,
        preserve_layout: args.layout,
    };

    let worker = reader.clone();
    let doc = document.clone();
    let text = run_blocking(&reader, move || worker.extract_text(&doc, &options)).await?;

    pb.finish_and_clear();

    match text {
        Some(text) => {
            info!("Extracted {} chars from {}", text.len(), document.origin());
            write_output(&text, args.output.as_deref())
        }
        None => {
            eprintln!(
                "{} No text could be extracted from {}",
                style("!").yellow(),
                args.input.display()
            );
            Ok(())
        }
    }
}
