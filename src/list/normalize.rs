//! Raw backend values to display values
//!
//! Every function here is total: a value that cannot be normalized is returned as the
//! backend sent it, and only that one field is affected.

use super::field::{FieldDescriptor, FieldType, type_of};
use crate::api::{RawRow, RowColumns};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

/// Canonical rendering of every normalized timestamp
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp layouts SharePoint emits, tried in order
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Date-only layouts, read as midnight; tried after `DATETIME_FORMATS`
const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

/// Separator of SharePoint's `<id>;#<value>` lookup encoding
const LOOKUP_DELIMITER: &str = ";#";

/// Separator used when a multi-value reference is flattened
const MULTI_VALUE_SEPARATOR: &str = "; ";

/// Parse any of the known layouts, then ISO-8601 with an offset (kept at its wall time)
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(value, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
}

pub fn normalize_timestamp(raw: &Value) -> Value {
    match raw {
        Value::String(s) if !s.is_empty() => match parse_timestamp(s) {
            Some(parsed) => Value::String(parsed.format(CANONICAL_FORMAT).to_string()),
            None => raw.clone(),
        },
        _ => raw.clone(),
    }
}

/// Display text of a user or lookup value; never absent
pub fn normalize_reference(raw: &Value) -> Value {
    Value::String(reference_text(raw))
}

fn reference_text(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::Object(map) => ["Title", "LookupValue"]
            .iter()
            .find_map(|key| map.get(*key))
            .map(reference_text)
            .unwrap_or_default(),
        Value::Array(items) => items
            .iter()
            .map(reference_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_SEPARATOR),
        Value::String(s) => lookup_value(s).to_string(),
        other => other.to_string(),
    }
}

/// `"12;#Engineering"` → `"Engineering"`; strings without the delimiter are returned whole
fn lookup_value(s: &str) -> &str {
    let mut parts = s.split(LOOKUP_DELIMITER);
    let first = parts.next().unwrap_or(s);
    parts.next().unwrap_or(first)
}

/// Normalize one value according to its column type
pub fn normalize_value(field_type: FieldType, raw: &Value) -> Value {
    match field_type {
        t if t.is_temporal() => normalize_timestamp(raw),
        t if t.is_reference() => normalize_reference(raw),
        _ => raw.clone(),
    }
}

/// One normalized row: column name to display value, with `ID` first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn id(&self) -> Option<i64> {
        self.0.get("ID").and_then(Value::as_i64)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Record(map)
    }
}

/// Row identifier from `ID` or `Id`, numeric when the backend sent digits
fn row_id(row: &RawRow) -> Value {
    match row.get("ID").or_else(|| row.get("Id")) {
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Value::String(s.clone()), Value::from),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Build a record from a raw row.
///
/// `AsReturned` keeps every column of the row, typing uncatalogued ones as text;
/// `Catalog` emits exactly the catalogued columns, absent ones included.
pub fn normalize_row(row: &RawRow, catalog: &[FieldDescriptor], columns: RowColumns) -> Record {
    let mut record = Map::new();
    record.insert("ID".to_string(), row_id(row));

    match columns {
        RowColumns::AsReturned => {
            for (name, raw) in row.iter().filter(|(name, _)| name.as_str() != "ID") {
                record.insert(name.clone(), normalize_value(type_of(catalog, name), raw));
            }
        }
        RowColumns::Catalog => {
            for field in catalog.iter().filter(|f| f.name != "ID") {
                let raw = row.get(&field.name).unwrap_or(&Value::Null);
                record.insert(field.name.clone(), normalize_value(field.field_type, raw));
            }
        }
    }

    Record(record)
}
