//! Metadata command - print the document information dictionary.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;

use super::{build_reader, open_document, or_dash, print_json, run_blocking, OutputFormat, ReaderArgs};

/// Arguments for the metadata command.
#[derive(Args)]
pub struct MetadataArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

pub async fn run(args: MetadataArgs, reader_args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let reader = build_reader(reader_args, config_path)?;
    let document = open_document(&reader, &args.input).await?;

    let worker = reader.clone();
    let doc = document.clone();
    let metadata = run_blocking(&reader, move || worker.extract_metadata(&doc)).await?;

    match args.format {
        OutputFormat::Json => print_json(&metadata)?,
        OutputFormat::Text => {
            println!("{} {}", style("File:").bold(), document.origin());
            println!("  Title:       {}", or_dash(metadata.title.as_deref()));
            println!("  Author:      {}", or_dash(metadata.author.as_deref()));
            println!("  Subject:     {}", or_dash(metadata.subject.as_deref()));
            println!("  Keywords:    {}", or_dash(metadata.keywords.as_deref()));
            println!("  Creator:     {}", or_dash(metadata.creator.as_deref()));
            println!("  Producer:    {}", or_dash(metadata.producer.as_deref()));
            println!("  Created:     {}", or_dash(metadata.creation_date.map(|d| d.to_rfc3339())));
            println!("  Modified:    {}", or_dash(metadata.modification_date.map(|d| d.to_rfc3339())));
            println!("  PDF version: {}", or_dash(metadata.pdf_version.as_deref()));
            println!("  Pages:       {}", metadata.page_count);
            println!("  Encrypted:   {}", metadata.encrypted);
        }
    }

    Ok(())
}
