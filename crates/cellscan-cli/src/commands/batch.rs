//! Batch processing command for multiple cell photos.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use cellscan_core::{BatchSummary, BatteryRecord, RecognitionPipeline};

use super::process::{format_csv, format_records, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input directory or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory for per-photo results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each photo
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a combined records CSV and batch summary
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single photo.
struct PhotoResult {
    path: PathBuf,
    records: Vec<BatteryRecord>,
}

pub async fn run(args: BatchArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let files = expand_inputs(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching photos found for: {}", args.input);
    }

    println!(
        "{} Found {} photos to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} photos")
            .unwrap()
            .progress_chars("=>-"),
    );

    let pipeline = Arc::new(RecognitionPipeline::from_env());
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        let pb = overall_pb.clone();

        handles.push(tokio::spawn(async move {
            // Holds a permit for the duration of one photo. The semaphore is
            // never closed, so acquisition cannot fail.
            let _permit = semaphore.acquire_owned().await.ok();
            let records = pipeline.process(&path).await;
            pb.inc(1);
            PhotoResult { path, records }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                if args.continue_on_error {
                    warn!("worker failed: {}", e);
                } else {
                    error!("worker failed: {}", e);
                    anyhow::bail!("Processing failed: {}", e);
                }
            }
        }
    }

    overall_pb.finish_with_message("Complete");

    // Photos where recognition degraded to an empty list are reported as
    // empty, not as failures.
    let empty: Vec<_> = results.iter().filter(|r| r.records.is_empty()).collect();

    if let Some(ref output_dir) = args.output_dir {
        for result in results.iter().filter(|r| !r.records.is_empty()) {
            let stem = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("photo");
            let extension = match args.format {
                OutputFormat::Json => "json",
                OutputFormat::Csv => "csv",
                OutputFormat::Text => "txt",
            };

            let output_path = output_dir.join(format!("{}.{}", stem, extension));
            let content = format_records(&result.records, args.format)?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    let all_records: Vec<BatteryRecord> = results
        .iter()
        .flat_map(|r| r.records.iter().cloned())
        .collect();

    if args.summary {
        let summary = BatchSummary::new(all_records.len());

        let base = args
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let records_path = base.join(format!("{}_records.csv", summary.batch_name));
        let summary_path = base.join(format!("{}_summary.json", summary.batch_name));

        fs::write(&records_path, format_csv(&all_records)?)?;
        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;

        println!(
            "{} Records written to {}",
            style("✓").green(),
            records_path.display()
        );
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} photos in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} battery cells recognized, {} photos empty",
        style(all_records.len()).green(),
        style(empty.len()).yellow()
    );

    if !empty.is_empty() {
        println!();
        println!("{}", style("Photos with no recognized cells:").yellow());
        for result in &empty {
            println!("  - {}", result.path.display());
        }
    }

    Ok(())
}

/// Expand the input argument into a list of photo paths.
///
/// A directory argument selects every photo directly inside it; anything
/// else is treated as a glob pattern. Only PNG and JPEG files qualify.
fn expand_inputs(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let path = Path::new(input);

    let mut files: Vec<PathBuf> = if path.is_dir() {
        fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| is_photo(p))
            .collect()
    } else {
        glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| is_photo(p))
            .collect()
    };

    files.sort();
    Ok(files)
}

fn is_photo(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg")
}
