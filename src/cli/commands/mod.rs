pub mod data;
pub mod export;
pub mod items;
pub mod search;
pub mod status;

use super::app::Commands;
use crate::config::Config;
use crate::list::ListClient;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Build a client for `config` and dispatch one command
pub async fn run(command: Commands, config: &Config) -> Result<()> {
    let mut client = ListClient::new(config.to_connection_settings(), config.client_options())
        .context("Failed to set up the list client")?;

    match command {
        Commands::Data(args) => data::data_command(&mut client, args).await,
        Commands::Fields => data::fields_command(&mut client).await,
        Commands::Create(args) => items::create_command(&mut client, args).await,
        Commands::Update(args) => items::update_command(&mut client, args).await,
        Commands::Delete(args) => items::delete_command(&mut client, args).await,
        Commands::Bulk(args) => items::bulk_command(&mut client, args).await,
        Commands::Export(args) => export::export_command(&mut client, args).await,
        Commands::Search { term } => search::search_command(&mut client, &term).await,
        Commands::Validate(args) => items::validate_command(&mut client, args).await,
        Commands::Status => status::status_command(&mut client).await,
    }
}

/// Pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to format JSON output")?;
    println!("{}", text);
    Ok(())
}

/// Parse a JSON object given inline or read from `file`
pub(crate) fn read_field_map(inline: Option<&str>, file: Option<&Path>) -> Result<Map<String, Value>> {
    let text = match (inline, file) {
        (Some(_), Some(_)) => anyhow::bail!("Cannot specify both inline JSON and --file"),
        (Some(text), None) => text.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON file: {}", path.display()))?,
        (None, None) => anyhow::bail!("Either provide a JSON object or use --file"),
    };
    parse_field_map(&text)
}

pub(crate) fn parse_field_map(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(text).context("Invalid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Expected a JSON object of field values, got: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_map() {
        let map = parse_field_map(r#"{"Title": "X", "Qty": 2}"#).unwrap();
        assert_eq!(map.get("Title"), Some(&Value::from("X")));
        assert!(parse_field_map("[1, 2]").is_err());
        assert!(parse_field_map("{").is_err());
    }

    #[test]
    fn test_read_field_map_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.json");
        fs::write(&path, r#"{"Title": "From file"}"#).unwrap();

        let map = read_field_map(None, Some(&path)).unwrap();
        assert_eq!(map.get("Title"), Some(&Value::from("From file")));
        assert!(read_field_map(Some("{}"), Some(&path)).is_err());
        assert!(read_field_map(None, None).is_err());
    }
}
