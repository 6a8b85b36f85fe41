//! Client-side filter, sort and pagination over fetched records

use super::normalize::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}' (expected asc or desc)", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// What a caller wants to see of a record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionCriteria {
    /// Field name to case-insensitive substring; all must match
    pub filters: BTreeMap<String, String>,
    pub sort_field: Option<String>,
    pub sort_order: SortOrder,
    page: usize,
    page_size: usize,
}

impl Default for ProjectionCriteria {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

impl ProjectionCriteria {
    /// Page and page size are clamped to at least 1
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            filters: BTreeMap::new(),
            sort_field: None,
            sort_order: SortOrder::Asc,
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn with_filter(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.filters.insert(field.into(), needle.into());
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = order;
        self
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows that must be fetched from the start of the list to cover this page
    pub fn rows_needed(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }

    fn window_start(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of records and the number of records that passed the filters
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub items: Vec<Record>,
    pub total: usize,
}

/// String form used for matching; absent and null values read as empty
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn matches_filters(record: &Record, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(field, needle)| {
        value_text(record.get(field))
            .to_lowercase()
            .contains(&needle.to_lowercase())
    })
}

/// Natively comparable sort key; a column mixing kinds sorts by string form instead
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl SortKey {
    fn of(value: Option<&Value>) -> Option<Self> {
        match value {
            None | Some(Value::Null) => Some(SortKey::Text(String::new())),
            Some(Value::Number(n)) => n.as_f64().map(SortKey::Number),
            Some(Value::String(s)) => Some(SortKey::Text(s.clone())),
            Some(Value::Bool(b)) => Some(SortKey::Bool(*b)),
            Some(_) => None,
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Stable sort by `field`; descending order keeps equal records in their original order
fn sort_records(records: &mut [Record], field: &str, order: SortOrder) {
    let keys: Option<Vec<SortKey>> = records.iter().map(|r| SortKey::of(r.get(field))).collect();
    let native = keys.filter(|keys| keys.windows(2).all(|pair| pair[0].same_kind(&pair[1])));

    let keys: Vec<SortKey> = match native {
        Some(keys) => keys,
        None => records
            .iter()
            .map(|r| SortKey::Text(value_text(r.get(field))))
            .collect(),
    };

    let mut keyed: Vec<(SortKey, Record)> = keys.into_iter().zip(records.iter().cloned()).collect();
    keyed.sort_by(|(a, _), (b, _)| match order {
        SortOrder::Asc => a.compare(b),
        SortOrder::Desc => b.compare(a),
    });

    for (slot, (_, record)) in records.iter_mut().zip(keyed) {
        *slot = record;
    }
}

/// Filter, then sort, then cut the requested page
pub fn project(records: Vec<Record>, criteria: &ProjectionCriteria) -> Projection {
    let mut filtered: Vec<Record> = records
        .into_iter()
        .filter(|record| matches_filters(record, &criteria.filters))
        .collect();

    if let Some(field) = criteria.sort_field.as_deref() {
        sort_records(&mut filtered, field, criteria.sort_order);
    }

    let total = filtered.len();
    let items = filtered
        .into_iter()
        .skip(criteria.window_start())
        .take(criteria.page_size)
        .collect();

    Projection { items, total }
}

/// Records where any value contains `term`, case-insensitively; an empty term keeps everything
pub fn search(records: Vec<Record>, term: &str) -> Vec<Record> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| {
            record
                .fields()
                .values()
                .any(|value| value_text(Some(value)).to_lowercase().contains(&needle))
        })
        .collect()
}
