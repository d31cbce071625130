//! Batch processing command for multiple invoice PDFs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use invex_core::output::CsvWriter;
use invex_core::{BatchRunner, DocumentState, JobRecord, JobState, JobStore};

use super::{ExtractionArgs, build_pipeline, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input PDFs
    #[arg(required = true)]
    input: String,

    /// Output directory for the CSV files (default from config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also write summary.csv to the output directory
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers (default from config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Print the final job status as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    extraction: ExtractionArgs,
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.batch.workers = jobs;
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!("{} Found {} files to process", style("ℹ").blue(), files.len());

    let (pipeline, credentials) = build_pipeline(&config, &args.extraction);
    let pipeline = pipeline.with_writer(CsvWriter::from_config(&config.output));
    let store = JobStore::new();
    let runner = BatchRunner::new(Arc::new(pipeline), store.clone(), &config.batch);

    let handle = runner.submit(files.clone(), credentials);
    let id = handle.id();
    debug!("Submitted job {}", id);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelled = false;

    while !handle.is_finished() {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(job) = store.get(id) {
                    pb.set_position(job.finished_documents() as u64);
                }
            }
            _ = &mut ctrl_c, if !cancelled => {
                cancelled = true;
                handle.cancel();
                pb.println(format!("{} Cancelling, waiting for running documents", style("!").yellow()));
            }
        }
    }

    let state = handle.wait().await;
    pb.finish_and_clear();

    let job = store
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Job {} disappeared from the store", id))?;

    if args.summary {
        std::fs::create_dir_all(&config.output.dir)?;
        let summary_path = config.output.dir.join("summary.csv");
        write_summary(&summary_path, &job)?;
        println!("{} Summary written to {}", style("✓").green(), summary_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print_report(&job, start.elapsed());
    }

    match state {
        Some(JobState::Completed) => Ok(()),
        Some(JobState::Failed) => anyhow::bail!("All {} documents failed", job.documents.len()),
        other => anyhow::bail!("Job {} ended in unexpected state {:?}", id, other),
    }
}

fn print_report(job: &JobRecord, elapsed: Duration) {
    for doc in &job.documents {
        match doc.state {
            DocumentState::Succeeded => println!(
                "  {} {} -> {}",
                style("✓").green(),
                doc.path.display(),
                doc.serial_number.as_deref().unwrap_or_default()
            ),
            DocumentState::Failed => println!(
                "  {} {}: {}",
                style("✗").red(),
                doc.path.display(),
                doc.message.as_deref().unwrap_or("failed")
            ),
            DocumentState::Cancelled => println!("  {} {} (cancelled)", style("-").dim(), doc.path.display()),
            DocumentState::Pending | DocumentState::Running => {
                warn!("{} still {:?} after job finished", doc.path.display(), doc.state)
            }
        }
    }

    println!();
    println!(
        "{} Processed {} files in {:.1}s: {} succeeded, {} failed, {} cancelled",
        style("✓").green(),
        job.documents.len(),
        elapsed.as_secs_f64(),
        job.count(DocumentState::Succeeded),
        job.count(DocumentState::Failed),
        job.count(DocumentState::Cancelled),
    );
}

fn write_summary(path: &Path, job: &JobRecord) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "job_id",
        "filename",
        "status",
        "serial_number",
        "remarks",
        "line_items",
        "warnings",
        "invoice_csv",
        "item_csv",
        "error",
        "finished_at",
    ])?;

    let finished_at = job
        .finished_at
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default();
    let job_id = job.id.to_string();

    for doc in &job.documents {
        let filename = doc.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let status = serde_json::to_value(doc.state)?;
        let error = match (&doc.error, &doc.message) {
            (Some(kind), Some(message)) => format!("{:?}: {}", kind, message),
            (None, Some(message)) => message.clone(),
            _ => String::new(),
        };

        wtr.write_record([
            job_id.as_str(),
            filename,
            status.as_str().unwrap_or(""),
            doc.serial_number.as_deref().unwrap_or(""),
            doc.remarks.as_deref().unwrap_or(""),
            &doc.line_items.to_string(),
            &doc.warnings.to_string(),
            &display(&doc.invoice_csv),
            &display(&doc.line_items_csv),
            &error,
            &finished_at,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

fn display(path: &Option<PathBuf>) -> String {
    path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
}
