use crate::export::{self, ExportFormat};
use crate::list::ListClient;
use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::path::PathBuf;

#[derive(Args)]
pub struct ExportArgs {
    /// Output format: excel (xlsx) or csv
    pub format: String,
    /// Directory to write the file into
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

pub async fn export_command(client: &mut ListClient, args: ExportArgs) -> Result<()> {
    let format: ExportFormat = args.format.parse()?;

    let records = client.try_export_all().await.context("Failed to export list")?;
    let file = export::write(&records, format)?;
    let path = file
        .save(&args.output_dir)
        .with_context(|| format!("Failed to write export into {}", args.output_dir.display()))?;

    eprintln!(
        "{} Exported {} item(s) as {}",
        "✓".bright_green().bold(),
        records.len(),
        format
    );
    println!("💾 {}", path.display().to_string().bright_green());
    Ok(())
}
