//! Process command - recognize battery cells in a single photo.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use cellscan_core::{BatteryRecord, RecognitionPipeline};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input photo (PNG or JPEG)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let extension = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !matches!(extension.as_str(), "png" | "jpg" | "jpeg") {
        anyhow::bail!("Unsupported file format: {}", extension);
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );

    pb.set_message("Initializing recognition pipeline...");
    pb.set_position(10);

    let pipeline = RecognitionPipeline::from_env();

    pb.set_message("Recognizing battery cells...");
    pb.set_position(30);

    let records = pipeline.process(&args.input).await;

    pb.set_position(90);
    pb.finish_with_message("Done");

    if records.is_empty() {
        println!(
            "{} No battery cells recognized in {}",
            style("!").yellow(),
            args.input.display()
        );
        return Ok(());
    }

    let output = format_records(&records, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    println!(
        "{} Recognized {} battery cells",
        style("✓").green(),
        records.len()
    );

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_records(records: &[BatteryRecord], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Csv => format_csv(records),
        OutputFormat::Text => Ok(format_text(records)),
    }
}

pub fn format_csv(records: &[BatteryRecord]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "serial_number",
        "model",
        "energy",
        "capacity",
        "voltage",
        "image_file",
        "recognition_method",
    ])?;

    for record in records {
        wtr.write_record([
            &record.serial_number,
            &record.model,
            &record.energy.to_string(),
            &record.capacity.to_string(),
            &record.voltage.to_string(),
            &record.image_file,
            &record
                .recognition_method
                .map(|m| m.to_string())
                .unwrap_or_default(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(records: &[BatteryRecord]) -> String {
    let mut output = String::new();

    for (i, record) in records.iter().enumerate() {
        output.push_str(&format!("Battery {}:\n", i + 1));
        output.push_str(&format!("  Serial:   {}\n", record.serial_number));
        output.push_str(&format!("  Model:    {}\n", record.model));
        output.push_str(&format!("  Energy:   {}Wh\n", record.energy));
        output.push_str(&format!("  Capacity: {}Ah\n", record.capacity));
        output.push_str(&format!("  Voltage:  {}V\n", record.voltage));
        if let Some(method) = record.recognition_method {
            output.push_str(&format!("  Method:   {}\n", method));
        }
        output.push('\n');
    }

    output
}
