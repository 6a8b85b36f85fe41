use super::{print_json, read_field_map};
use crate::list::{ListClient, MutationRequest};
use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct CreateArgs {
    /// Field values as a JSON object
    pub json: Option<String>,
    /// Read the JSON object from a file instead
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Item ID
    pub id: i64,
    /// Field values as a JSON object
    pub json: Option<String>,
    /// Read the JSON object from a file instead
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Item ID
    pub id: i64,
}

#[derive(Args)]
pub struct BulkArgs {
    /// JSON file holding `{"operations": [...]}` or a bare array of operations
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Field values as a JSON object
    pub json: Option<String>,
    /// Read the JSON object from a file instead
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BulkFile {
    Wrapped { operations: Vec<MutationRequest> },
    Bare(Vec<MutationRequest>),
}

impl BulkFile {
    fn into_operations(self) -> Vec<MutationRequest> {
        match self {
            BulkFile::Wrapped { operations } | BulkFile::Bare(operations) => operations,
        }
    }
}

pub(crate) fn parse_operations(text: &str) -> Result<Vec<MutationRequest>> {
    let file: BulkFile = serde_json::from_str(text)
        .context("Bulk file must hold an array of operations or {\"operations\": [...]}")?;
    Ok(file.into_operations())
}

pub async fn create_command(client: &mut ListClient, args: CreateArgs) -> Result<()> {
    let data = read_field_map(args.json.as_deref(), args.file.as_deref())?;
    let id = client.try_create(&data).await.context("Failed to create item")?;
    eprintln!("{} Created item {}", "✓".bright_green().bold(), id.to_string().bright_green().bold());
    print_json(&json!({ "success": true, "id": id }))
}

pub async fn update_command(client: &mut ListClient, args: UpdateArgs) -> Result<()> {
    let data = read_field_map(args.json.as_deref(), args.file.as_deref())?;
    client
        .try_update(args.id, &data)
        .await
        .with_context(|| format!("Failed to update item {}", args.id))?;
    eprintln!("{} Updated item {}", "✓".bright_green().bold(), args.id);
    print_json(&json!({ "success": true }))
}

pub async fn delete_command(client: &mut ListClient, args: DeleteArgs) -> Result<()> {
    client
        .try_delete(args.id)
        .await
        .with_context(|| format!("Failed to delete item {}", args.id))?;
    eprintln!("{} Deleted item {}", "✓".bright_green().bold(), args.id);
    print_json(&json!({ "success": true }))
}

/// Partial failure still prints the itemized result and exits successfully
pub async fn bulk_command(client: &mut ListClient, args: BulkArgs) -> Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read bulk file: {}", args.file.display()))?;
    let operations = parse_operations(&text)?;

    let result = client.bulk_apply(&operations).await;
    match result.failure(operations.len()) {
        Some(failure) => eprintln!("{} {}", "⚠️".bright_yellow().bold(), failure),
        None => eprintln!(
            "{} Applied {} operation(s)",
            "✓".bright_green().bold(),
            operations.len()
        ),
    }
    print_json(&result)
}

pub async fn validate_command(client: &mut ListClient, args: ValidateArgs) -> Result<()> {
    let data = read_field_map(args.json.as_deref(), args.file.as_deref())?;
    let report = client.validate(&data).await.context("Failed to load the field catalog")?;
    print_json(&report)
}
