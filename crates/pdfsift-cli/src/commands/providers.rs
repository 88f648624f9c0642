//! Providers command - show what this build and machine can do.

use std::path::Path;

use clap::Args;
use console::style;
use serde::Serialize;

use pdfsift_core::registry;
use pdfsift_core::{CapabilityReport, CapabilityStatus, DependencyStatus, ProviderId};

use super::{build_reader, print_json, OutputFormat, ReaderArgs};

/// Arguments for the providers command.
#[derive(Args)]
pub struct ProvidersArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Serialize)]
struct ProvidersReport {
    available: Vec<ProviderId>,
    capabilities: CapabilityReport,
    dependencies: DependencyStatus,
}

pub async fn run(args: ProvidersArgs, reader_args: &ReaderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let reader = build_reader(reader_args, config_path)?;

    let report = ProvidersReport {
        available: registry::list_available(reader.runtime()).into_iter().collect(),
        capabilities: reader.check_capabilities(),
        dependencies: reader.check_dependencies(),
    };

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_text(&report),
    }

    Ok(())
}

fn mark(available: bool) -> console::StyledObject<&'static str> {
    if available {
        style("✓").green()
    } else {
        style("✗").red()
    }
}

fn print_status(name: &str, status: &CapabilityStatus) {
    println!("  {} {:<18} {}", mark(status.available), name, status.detail);
}

fn print_text(report: &ProvidersReport) {
    let caps = &report.capabilities;

    println!("{} {}", style("Runtime:").bold(), caps.runtime);
    println!(
        "{} {}",
        style("Available:").bold(),
        report
            .available
            .iter()
            .map(|id| format!("{} ({:?})", id, id.role()).to_lowercase())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "{} parser={}, ocr={}",
        style("Selected:").bold(),
        caps.parser,
        caps.ocr_provider
            .map(|id| id.to_string())
            .unwrap_or_else(|| "disabled".to_string())
    );

    println!();
    println!("{}", style("Capabilities:").bold());
    print_status("text extraction", &caps.text_extraction);
    print_status("image extraction", &caps.image_extraction);
    print_status("metadata", &caps.metadata);
    print_status("ocr", &caps.ocr);

    println!();
    println!("{}", style("Dependencies:").bold());
    for check in &report.dependencies.checks {
        println!(
            "  {} {:<18} {}",
            mark(check.available),
            check.provider,
            check.detail
        );
    }
}
