//! In-memory tabular record set.
//!
//! Loading from files is the caller's job; the engine only sees rows of
//! JSON values keyed by column name, plus optional metadata the data
//! owner declared about each field.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A single row, keyed by column name.
pub type Record = BTreeMap<String, Value>;

/// Declared or inferred type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Whole numbers.
    Integer,
    /// Any JSON number.
    Number,
    /// Free text.
    String,
    /// `true` / `false`.
    Boolean,
    /// RFC 3339 timestamp or `YYYY-MM-DD` date string.
    Date,
}

impl FieldType {
    /// Returns true if `value` conforms to this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => value.as_str().and_then(parse_date).is_some(),
        }
    }
}

/// Parses the date formats accepted for [`FieldType::Date`].
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Constraints declared for one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Expected value type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Whether every row must carry a non-null value.
    #[serde(default)]
    pub required: bool,

    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Enumeration of permitted values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,

    /// Regular expression string values must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Whether values must be distinct.
    #[serde(default)]
    pub unique: bool,

    /// Maximum age, in days, of date values relative to assessment time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<f64>,
}

impl FieldSpec {
    /// True if the field declaration constrains values (type, range, enumeration or pattern).
    ///
    /// Auto mode counts these fields when deciding whether a dataset
    /// already carries a rich enough schema for validation.
    pub fn has_constraints(&self) -> bool {
        self.field_type.is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.allowed_values.is_some()
            || self.pattern.is_some()
    }
}

/// Metadata bound to a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Standard the data owner claims conformance to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_id: Option<String>,

    /// Per-field declarations.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

impl DatasetMetadata {
    /// Number of declared fields that carry value constraints.
    pub fn constrained_field_count(&self) -> usize {
        self.fields.values().filter(|f| f.has_constraints()).count()
    }
}

/// A tabular dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Logical name of the data source, used as the cache key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Column names in presentation order.
    pub columns: Vec<String>,

    /// Row data.
    pub rows: Vec<Record>,

    /// Explicitly supplied metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DatasetMetadata>,
}

impl Dataset {
    /// Creates a dataset with explicit columns.
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self {
            source: None,
            columns,
            rows,
            metadata: None,
        }
    }

    /// Creates a dataset whose columns are the union of the row keys,
    /// in order of first appearance.
    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }
        Self::new(columns, rows)
    }

    /// Names the data source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Binds explicit metadata.
    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the dataset declares `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Iterates the non-null values of a column.
    pub fn values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column))
            .filter(|v| !is_missing(v))
    }

    /// Number of non-null values in a column.
    pub fn non_null_count(&self, column: &str) -> usize {
        self.values(column).count()
    }

    /// Percentage of missing cells across all declared columns.
    pub fn missing_percentage(&self) -> f64 {
        let cells = self.row_count() * self.column_count();
        if cells == 0 {
            return 0.0;
        }
        let present: usize = self.columns.iter().map(|c| self.non_null_count(c)).sum();
        (cells - present) as f64 / cells as f64 * 100.0
    }
}

/// Null and empty strings both count as missing.
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
