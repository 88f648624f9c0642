//! CLI for PDF text, image and metadata extraction with OCR fallback.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, images, info, metadata, ocr, providers, text, ReaderArgs};

/// pdfsift - Extract text, images and metadata from PDFs, with OCR for scans
#[derive(Parser)]
#[command(name = "pdfsift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    reader: ReaderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a PDF and recommend an extraction strategy
    Info(info::InfoArgs),

    /// Extract text, using OCR when the PDF has no text layer
    Text(text::TextArgs),

    /// Extract embedded images as PNG files
    Images(images::ImagesArgs),

    /// Show document metadata
    Metadata(metadata::MetadataArgs),

    /// Run OCR on image files
    Ocr(ocr::OcrArgs),

    /// List providers, capabilities and installed dependencies
    Providers(providers::ProvidersArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Info(args) => info::run(args, &cli.reader, config_path).await,
        Commands::Text(args) => text::run(args, &cli.reader, config_path).await,
        Commands::Images(args) => images::run(args, &cli.reader, config_path).await,
        Commands::Metadata(args) => metadata::run(args, &cli.reader, config_path).await,
        Commands::Ocr(args) => ocr::run(args, &cli.reader, config_path).await,
        Commands::Providers(args) => providers::run(args, &cli.reader, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
