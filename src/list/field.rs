use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical column type; drives normalization and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Number,
    Integer,
    Boolean,
    DateTime,
    Date,
    Choice,
    User,
    Lookup,
    Counter,
}

impl FieldType {
    /// Map a SharePoint `TypeAsString`; types without a canonical counterpart read as text
    pub fn from_backend_name(name: &str) -> Self {
        match name {
            "Number" | "Currency" => FieldType::Number,
            "Integer" => FieldType::Integer,
            "Boolean" => FieldType::Boolean,
            "DateTime" => FieldType::DateTime,
            "Date" => FieldType::Date,
            "Choice" | "MultiChoice" => FieldType::Choice,
            "User" | "UserMulti" => FieldType::User,
            "Lookup" | "LookupMulti" => FieldType::Lookup,
            "Counter" => FieldType::Counter,
            _ => FieldType::Text,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::DateTime | FieldType::Date)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Integer)
    }

    /// User and lookup columns hold references to other objects
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::User | FieldType::Lookup)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One list column as presented to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub choices: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, title: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            field_type,
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }
}

/// Type of `name` in `catalog`, text when the column is not catalogued
pub fn type_of(catalog: &[FieldDescriptor], name: &str) -> FieldType {
    catalog
        .iter()
        .find(|f| f.name == name)
        .map_or(FieldType::Text, |f| f.field_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_names() {
        assert_eq!(FieldType::from_backend_name("Note"), FieldType::Text);
        assert_eq!(FieldType::from_backend_name("Currency"), FieldType::Number);
        assert_eq!(FieldType::from_backend_name("UserMulti"), FieldType::User);
        assert_eq!(FieldType::from_backend_name("Counter"), FieldType::Counter);
        assert_eq!(FieldType::from_backend_name("Calculated"), FieldType::Text);
    }

    #[test]
    fn test_descriptor_serializes_type_key() {
        let field = FieldDescriptor::new("Status", "Status", FieldType::Choice)
            .required()
            .with_choices(vec!["Open".into()]);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"name": "Status", "title": "Status", "type": "Choice", "required": true, "choices": ["Open"]})
        );
    }
}
