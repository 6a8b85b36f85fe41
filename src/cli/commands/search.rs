use super::print_json;
use crate::list::ListClient;
use anyhow::{Context, Result};
use colored::*;

pub async fn search_command(client: &mut ListClient, term: &str) -> Result<()> {
    let result = client.try_search(term).await.context("Search failed")?;
    eprintln!(
        "{} {} matching item(s) for '{}'",
        "🔍".bright_cyan(),
        result.total.to_string().bright_green().bold(),
        term
    );
    print_json(&result)
}
