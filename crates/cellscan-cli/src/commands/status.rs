//! Status command - report recognition method availability.

use clap::Args;
use console::style;

use cellscan_core::RecognitionPipeline;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: StatusArgs) -> anyhow::Result<()> {
    let pipeline = RecognitionPipeline::from_env();
    let status = pipeline.status();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Recognition methods:");
    for method in &status.methods {
        let marker = if method.available {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {} - {}", marker, method.name, method.description);
        if let Some(model) = &method.model {
            println!("      model: {}", model);
        }
    }

    println!();
    println!("Preferred method: {}", style(&status.preferred).cyan());

    Ok(())
}
