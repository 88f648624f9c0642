//! Images command - save embedded images as PNG.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::warn;

use super::{build_reader, open_document, print_json, run_blocking, spinner, OutputFormat, ReaderArgs};

/// Arguments for the images command.
#[derive(Args)]
pub struct ImagesArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Directory to write PNG files to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// File name prefix (default: input file stem)
    #[arg(long)]
    prefix: Option<String>,

    /// Output format for the summary
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct SavedImage {
    page: u32,
    width: u32,
    height: u32,
    channels: u8,
    path: PathBuf,
}

pub async fn run(args: ImagesArgs, reader_args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let reader = build_reader(reader_args, config_path)?;
    let pb = spinner("Extracting images...");

    let document = open_document(&reader, &args.input).await?;
    let worker = reader.clone();
    let doc = document.clone();
    let images = run_blocking(&reader, move || worker.extract_images(&doc)).await?;

    pb.finish_and_clear();

    fs::create_dir_all(&args.output_dir)?;
    let prefix = args.prefix.clone().unwrap_or_else(|| {
        args.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    });

    let mut saved = Vec::new();
    let mut index_on_page = 0;
    let mut last_page = 0;

    for image in &images {
        if image.page != last_page {
            last_page = image.page;
            index_on_page = 0;
        }
        index_on_page += 1;

        let Some(decoded) = image.to_image() else {
            warn!("Skipping image {} on page {}: unsupported layout", index_on_page, image.page);
            continue;
        };

        let path = args
            .output_dir
            .join(format!("{}-p{}-{}.png", prefix, image.page, index_on_page));
        decoded.save_with_format(&path, image::ImageFormat::Png)?;

        saved.push(SavedImage {
            page: image.page,
            width: image.width,
            height: image.height,
            channels: image.channels,
            path,
        });
    }

    match args.format {
        OutputFormat::Json => print_json(&saved)?,
        OutputFormat::Text => {
            for image in &saved {
                println!(
                    "page {:>3}: {}x{} ({} channels) -> {}",
                    image.page,
                    image.width,
                    image.height,
                    image.channels,
                    image.path.display()
                );
            }
            println!(
                "{} Saved {} images to {}",
                style("✓").green(),
                saved.len(),
                args.output_dir.display()
            );
        }
    }

    Ok(())
}
