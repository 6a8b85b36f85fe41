use super::commands::data::DataArgs;
use super::commands::export::ExportArgs;
use super::commands::items::{BulkArgs, CreateArgs, DeleteArgs, UpdateArgs, ValidateArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sharepoint-cli")]
#[command(about = "A CLI tool for reading and editing SharePoint lists, on-premises or online")]
pub struct Cli {
    /// Path to a TOML config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch one page of list items
    Data(DataArgs),
    /// Show the list's field catalog
    Fields,
    /// Create an item from a JSON field map
    Create(CreateArgs),
    /// Update an item from a JSON field map
    Update(UpdateArgs),
    /// Delete an item
    Delete(DeleteArgs),
    /// Apply a batch of create/update/delete operations from a JSON file
    Bulk(BulkArgs),
    /// Export every item to an Excel or CSV file
    Export(ExportArgs),
    /// Case-insensitive substring search across all columns
    Search {
        /// Text to look for
        term: String,
    },
    /// Check a JSON field map against the field catalog
    Validate(ValidateArgs),
    /// Show the backend in use and test authentication
    Status,
}
