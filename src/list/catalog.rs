//! Field catalog resolution
//!
//! SharePoint Online reports its columns; the classic web services do not, so their
//! catalog is the six standard columns plus whatever a single sample row reveals, each
//! typed by a fixed ladder of heuristics.

use super::field::{FieldDescriptor, FieldType};
use crate::api::{ListBackend, ListResult, RawField, RawRow, Session};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

const STANDARD_FIELDS: [(&str, &str, FieldType, bool); 6] = [
    ("ID", "ID", FieldType::Counter, false),
    ("Title", "Title", FieldType::Text, true),
    ("Created", "Created", FieldType::DateTime, false),
    ("Modified", "Modified", FieldType::DateTime, false),
    ("Author", "Created By", FieldType::User, false),
    ("Editor", "Modified By", FieldType::User, false),
];

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}",
        r"\d{1,2}/\d{1,2}/\d{4}",
        r"\d{4}-\d{2}-\d{2}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// `_xHHHH_` escapes SharePoint uses for characters in internal names
static ENCODED_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"_x([0-9A-Fa-f]{4})_").unwrap());

/// Evaluated in order; the first rule that accepts a sample value decides its type
const INFERENCE_RULES: [fn(&str) -> Option<FieldType>; 3] = [date_like, numeric, boolean_like];

fn date_like(value: &str) -> Option<FieldType> {
    DATE_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(value))
        .then_some(FieldType::DateTime)
}

fn numeric(value: &str) -> Option<FieldType> {
    value.trim().parse::<f64>().ok()?;
    Some(if value.contains('.') {
        FieldType::Number
    } else {
        FieldType::Integer
    })
}

fn boolean_like(value: &str) -> Option<FieldType> {
    matches!(value.to_lowercase().as_str(), "true" | "false" | "1" | "0").then_some(FieldType::Boolean)
}

/// Best-effort type of a single sample value
pub fn infer_type(value: &Value) -> FieldType {
    let text = match value {
        Value::Null => return FieldType::Text,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    INFERENCE_RULES
        .iter()
        .find_map(|rule| rule(&text))
        .unwrap_or(FieldType::Text)
}

/// Display title for an internal column name: escapes decoded, underscores spaced, words capitalized
pub fn inferred_title(name: &str) -> String {
    let decoded = ENCODED_CHAR.replace_all(name, |caps: &regex::Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });

    let mut title = String::with_capacity(decoded.len());
    let mut in_word = false;
    for c in decoded.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if in_word {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            title.push(c);
            in_word = false;
        }
    }
    title
}

pub fn standard_fields() -> Vec<FieldDescriptor> {
    STANDARD_FIELDS
        .iter()
        .map(|(name, title, field_type, required)| {
            let field = FieldDescriptor::new(*name, *title, *field_type);
            if *required { field.required() } else { field }
        })
        .collect()
}

/// Standard columns followed by one inferred column per remaining key of `sample`
pub fn infer_catalog(sample: Option<&RawRow>) -> Vec<FieldDescriptor> {
    let mut catalog = standard_fields();
    let Some(sample) = sample else {
        debug!("No sample row; catalog holds the standard fields only");
        return catalog;
    };

    for (name, value) in sample {
        if catalog.iter().any(|f| &f.name == name) {
            continue;
        }
        let field_type = infer_type(value);
        debug!("Inferred {} as {}", name, field_type);
        catalog.push(FieldDescriptor::new(name.as_str(), inferred_title(name), field_type));
    }
    catalog
}

/// Visible, writable columns from backend metadata, first definition wins on duplicate names
pub fn catalog_from_metadata(fields: Vec<RawField>) -> Vec<FieldDescriptor> {
    let mut seen = HashSet::new();
    fields
        .into_iter()
        .filter(RawField::is_user_visible)
        .filter(|f| seen.insert(f.internal_name.clone()))
        .map(|f| {
            let field_type = FieldType::from_backend_name(&f.type_name);
            let descriptor = FieldDescriptor::new(f.internal_name, f.title, field_type)
                .with_choices(f.choices);
            if f.required { descriptor.required() } else { descriptor }
        })
        .collect()
}

/// Build the catalog from metadata when the backend has it, otherwise from a sample row.
///
/// Sampling failures degrade to the standard fields; metadata failures are returned.
pub async fn resolve_catalog(
    backend: &dyn ListBackend,
    session: &Session,
) -> ListResult<Vec<FieldDescriptor>> {
    if let Some(fields) = backend.fetch_field_metadata(session).await? {
        let catalog = catalog_from_metadata(fields);
        debug!("Catalog from metadata: {} fields", catalog.len());
        return Ok(catalog);
    }

    match backend.fetch_raw_list(session, 1).await {
        Ok(rows) => Ok(infer_catalog(rows.first())),
        Err(e) => {
            warn!("Could not sample a row for field inference: {}", e);
            Ok(standard_fields())
        }
    }
}
