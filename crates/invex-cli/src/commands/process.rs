//! Process command - extract data from a single invoice PDF.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invex_core::output::CsvWriter;
use invex_core::{ExtractionMethod, ProcessedDocument, TextSource};

use super::{ExtractionArgs, build_pipeline, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output directory for the CSV files (default from config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the normalized records as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let (mut pipeline, credentials) = build_pipeline(&config, &args.extraction);
    if let Some(dir) = &args.output_dir {
        pipeline = pipeline.with_writer(CsvWriter::new(dir));
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Extracting {}", args.input.display()));

    let result = pipeline.process_file(&args.input, credentials.as_ref()).await;
    pb.finish_and_clear();

    let doc = result.map_err(|e| anyhow::anyhow!("{}: {}", args.input.display(), e))?;

    if args.json {
        let value = serde_json::json!({
            "invoice": doc.normalized.invoice,
            "line_items": doc.normalized.line_items,
            "warnings": doc.normalized.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_summary(&doc);
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

fn print_summary(doc: &ProcessedDocument) {
    let invoice = &doc.normalized.invoice;

    println!(
        "{} Invoice {} ({} line items)",
        style("✓").green(),
        invoice.invoice_number.as_deref().unwrap_or("<unknown>"),
        doc.normalized.line_items.len()
    );
    println!("  Serial:  {}", doc.serial_number);
    if let Some(total) = &invoice.total_invoice_value {
        println!("  Total:   {}", total);
    }

    let source = match doc.text_source {
        TextSource::TextLayer => "text layer",
        TextSource::Ocr => "OCR",
    };
    println!("  Source:  {}, {}", source, invoice.remarks);

    if let (ExtractionMethod::Rules, Some(reason)) = (doc.method, &doc.llm_error) {
        println!("{} LLM not used: {}", style("ℹ").blue(), reason);
    }

    for warning in &doc.normalized.warnings {
        println!(
            "{} {}: kept '{}' ({})",
            style("!").yellow(),
            warning.field,
            warning.value,
            warning.reason
        );
    }

    println!("  Wrote:   {}", doc.output.invoice_path.display());
    println!("           {}", doc.output.line_items_path.display());
}
