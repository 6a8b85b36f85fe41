use super::field::{FieldDescriptor, FieldType};
use super::normalize::parse_timestamp;
use super::projection::value_text;
use crate::api::ListError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of checking a field map against a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn into_result(self) -> Result<(), ListError> {
        if self.valid {
            Ok(())
        } else {
            Err(ListError::Validation(self.errors))
        }
    }
}

/// Empty strings, zero, false, null and empty collections count as "no value"
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_timestamp(value: &Value) -> bool {
    value.as_str().and_then(parse_timestamp).is_some()
}

/// Check presence, date and number syntax, and choice membership; errors follow catalog order
pub fn validate(data: &Map<String, Value>, catalog: &[FieldDescriptor]) -> ValidationReport {
    let mut errors = Vec::new();

    for field in catalog {
        let Some(value) = data.get(&field.name) else {
            if field.required {
                errors.push(format!("{} is required", field.title));
            }
            continue;
        };

        match field.field_type {
            t if t.is_temporal() && !is_blank(value) && !is_timestamp(value) => {
                errors.push(format!("{} has invalid date format", field.title));
            }
            t if t.is_numeric() && !value.is_null() && !is_numeric(value) => {
                errors.push(format!("{} must be a number", field.title));
            }
            FieldType::Choice
                if !is_blank(value)
                    && !field.choices.iter().any(|c| Some(c.as_str()) == value.as_str()) =>
            {
                errors.push(format!(
                    "{} has invalid choice: {}",
                    field.title,
                    value_text(Some(value))
                ));
            }
            _ => {}
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("Title", "Title", FieldType::Text).required(),
            FieldDescriptor::new("Due", "Due Date", FieldType::DateTime),
            FieldDescriptor::new("Cost", "Cost", FieldType::Number),
            FieldDescriptor::new("Qty", "Quantity", FieldType::Integer),
            FieldDescriptor::new("Status", "Status", FieldType::Choice)
                .with_choices(vec!["Open".into(), "Closed".into()]),
        ]
    }

    #[test]
    fn test_empty_map_reports_required_title() {
        let only_title = vec![FieldDescriptor::new("Title", "Title", FieldType::Text).required()];
        let report = validate(&Map::new(), &only_title);
        assert_eq!(
            report,
            ValidationReport {
                valid: false,
                errors: vec!["Title is required".to_string()],
            }
        );
    }

    #[test]
    fn test_valid_data() {
        let data = json!({"Title": "x", "Due": "2024-02-01", "Cost": "12.5", "Qty": 3, "Status": "Open"});
        let report = validate(data.as_object().unwrap(), &catalog());
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_every_rule_in_catalog_order() {
        let data = json!({"Due": "soon", "Cost": "cheap", "Qty": "many", "Status": "Pending"});
        let report = validate(data.as_object().unwrap(), &catalog());
        assert_eq!(
            report.errors,
            vec![
                "Title is required",
                "Due Date has invalid date format",
                "Cost must be a number",
                "Quantity must be a number",
                "Status has invalid choice: Pending",
            ]
        );
    }

    #[test]
    fn test_blank_values_skip_format_checks() {
        let data = json!({"Title": "x", "Due": "", "Cost": null, "Status": ""});
        assert!(validate(data.as_object().unwrap(), &catalog()).valid);
    }

    #[test]
    fn test_into_result() {
        let report = validate(&Map::new(), &catalog());
        assert_eq!(
            report.into_result(),
            Err(ListError::Validation(vec!["Title is required".to_string()]))
        );
    }
}
