use super::print_json;
use crate::list::{ListClient, ProjectionCriteria, SortOrder};
use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use log::info;
use serde_json::{Value, json};

#[derive(Args)]
pub struct DataArgs {
    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,
    /// Items per page (defaults to the configured rows per page)
    #[arg(long)]
    pub page_size: Option<usize>,
    /// Substring filter as FIELD=VALUE; repeat to combine
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,
    /// Filters as a JSON object of field to substring
    #[arg(long)]
    pub filters_json: Option<String>,
    /// Field to sort by
    #[arg(long)]
    pub sort_field: Option<String>,
    /// Sort direction (asc or desc)
    #[arg(long, default_value = "asc")]
    pub sort_order: SortOrder,
}

impl DataArgs {
    pub fn criteria(&self, default_page_size: usize) -> Result<ProjectionCriteria> {
        let mut criteria = ProjectionCriteria::new(self.page, self.page_size.unwrap_or(default_page_size));

        if let Some(text) = &self.filters_json {
            let parsed: serde_json::Map<String, Value> =
                serde_json::from_str(text).context("--filters-json must be a JSON object")?;
            for (field, needle) in parsed {
                let needle = match needle {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                criteria = criteria.with_filter(field, needle);
            }
        }

        for filter in &self.filters {
            let (field, needle) = filter
                .split_once('=')
                .with_context(|| format!("Filter must look like FIELD=VALUE: {}", filter))?;
            criteria = criteria.with_filter(field.trim(), needle);
        }

        if let Some(field) = &self.sort_field {
            criteria = criteria.with_sort(field.clone(), self.sort_order);
        }
        Ok(criteria)
    }
}

pub async fn data_command(client: &mut ListClient, args: DataArgs) -> Result<()> {
    let criteria = args.criteria(client.options().rows_per_page)?;
    info!("Fetching page {} ({} per page)", criteria.page(), criteria.page_size());

    let page = client
        .try_fetch_page(&criteria)
        .await
        .context("Failed to fetch list items")?;

    if page.total_is_estimate {
        eprintln!(
            "{} {}",
            "⚠️".bright_yellow(),
            "Total counts only the rows fetched so far; the list may hold more".dimmed()
        );
    }
    print_json(&page)
}

pub async fn fields_command(client: &mut ListClient) -> Result<()> {
    let fields = client
        .try_fetch_catalog()
        .await
        .context("Failed to fetch list fields")?;
    print_json(&json!({ "fields": fields }))
}
