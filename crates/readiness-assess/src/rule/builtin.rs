//! Rules shipped with the engine.
//!
//! Column rules count passing values among the non-null values of one
//! column (except [`NotNullRule`], which counts rows). Each rule carries a
//! failure tolerance; the default tolerates no failures.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Provenance, Rule, RuleCategory, RuleResult};
use crate::dataset::{is_missing, Dataset, FieldType, Record};
use crate::dimension::Dimension;
use crate::error::RuleError;

/// Failure rate tolerated by built-in rules unless overridden.
pub const DEFAULT_TOLERANCE: f64 = 0.0;

/// Maximum offending values echoed into rule details.
const MAX_SAMPLES: usize = 5;

fn require_column(dataset: &Dataset, rule: &str, column: &str) -> Result<(), RuleError> {
    if dataset.has_column(column) {
        Ok(())
    } else {
        Err(RuleError::MissingColumn {
            rule: rule.to_string(),
            column: column.to_string(),
        })
    }
}

/// Identity shared by the column rules.
#[derive(Debug, Clone)]
struct ColumnRule {
    id: String,
    column: String,
    provenance: Provenance,
    tolerance: f64,
}

impl ColumnRule {
    fn new(id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            column: column.into(),
            provenance: Provenance::Explicit,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Counts values satisfying `check`, collecting a few offenders.
    fn count<F>(&self, dataset: &Dataset, mut check: F) -> Result<RuleResult, RuleError>
    where
        F: FnMut(&Value) -> bool,
    {
        require_column(dataset, &self.id, &self.column)?;
        let mut passed = 0;
        let mut total = 0;
        let mut samples = Vec::new();
        for value in dataset.values(&self.column) {
            total += 1;
            if check(value) {
                passed += 1;
            } else if samples.len() < MAX_SAMPLES {
                samples.push(value.clone());
            }
        }
        let mut result = RuleResult::from_counts(passed, total, self.tolerance);
        if passed < total {
            result = result
                .with_finding(format!(
                    "{} of {} values in '{}' failed {}",
                    total - passed,
                    total,
                    self.column,
                    self.id
                ))
                .with_detail("samples", Value::Array(samples));
        }
        Ok(result)
    }
}

macro_rules! column_rule_builders {
    ($ty:ty) => {
        impl $ty {
            /// Marks the rule as inferred from data.
            #[must_use]
            pub fn inferred(mut self) -> Self {
                self.base.provenance = Provenance::Inferred;
                self
            }

            /// Overrides the tolerated failure rate.
            #[must_use]
            pub fn with_tolerance(mut self, tolerance: f64) -> Self {
                self.base.tolerance = tolerance.clamp(0.0, 1.0);
                self
            }

            /// Column this rule inspects.
            pub fn column(&self) -> &str {
                &self.base.column
            }
        }
    };
}

/// Every row must carry a value in the column.
#[derive(Debug, Clone)]
pub struct NotNullRule {
    base: ColumnRule,
}

impl NotNullRule {
    /// Creates a not-null rule for `column`.
    pub fn new(id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            base: ColumnRule::new(id, column),
        }
    }
}

column_rule_builders!(NotNullRule);

impl Rule for NotNullRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Completeness
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Required
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        require_column(dataset, &self.base.id, &self.base.column)?;
        let total = dataset.row_count();
        let present = dataset.non_null_count(&self.base.column);
        let mut result = RuleResult::from_counts(present, total, self.base.tolerance);
        if present < total {
            result = result.with_finding(format!(
                "{} of {} rows missing '{}'",
                total - present,
                total,
                self.base.column
            ));
        }
        Ok(result)
    }
}

/// Values must have the declared type.
#[derive(Debug, Clone)]
pub struct TypeRule {
    base: ColumnRule,
    field_type: FieldType,
}

impl TypeRule {
    /// Creates a type rule.
    pub fn new(id: impl Into<String>, column: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            base: ColumnRule::new(id, column),
            field_type,
        }
    }
}

column_rule_builders!(TypeRule);

impl Rule for TypeRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Validity
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Type
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let field_type = self.field_type;
        self.base.count(dataset, |v| field_type.matches(v))
    }
}

/// String values must match a regular expression.
#[derive(Debug, Clone)]
pub struct PatternRule {
    base: ColumnRule,
    pattern: Regex,
}

impl PatternRule {
    /// Creates a pattern rule; fails if the pattern does not compile.
    pub fn new(
        id: impl Into<String>,
        column: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, RuleError> {
        let compiled = Regex::new(pattern).map_err(|e| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base: ColumnRule::new(id, column),
            pattern: compiled,
        })
    }
}

column_rule_builders!(PatternRule);

impl Rule for PatternRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Validity
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Format
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let pattern = &self.pattern;
        self.base
            .count(dataset, |v| v.as_str().is_some_and(|s| pattern.is_match(s)))
    }
}

/// Values must belong to an enumeration.
#[derive(Debug, Clone)]
pub struct AllowedValuesRule {
    base: ColumnRule,
    allowed: Vec<Value>,
}

impl AllowedValuesRule {
    /// Creates an enumeration rule.
    pub fn new(id: impl Into<String>, column: impl Into<String>, allowed: Vec<Value>) -> Self {
        Self {
            base: ColumnRule::new(id, column),
            allowed,
        }
    }
}

column_rule_builders!(AllowedValuesRule);

impl Rule for AllowedValuesRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Validity
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Enumeration
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let allowed = &self.allowed;
        self.base.count(dataset, |v| allowed.contains(v))
    }
}

/// Numeric values must fall within inclusive bounds.
#[derive(Debug, Clone)]
pub struct RangeRule {
    base: ColumnRule,
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeRule {
    /// Creates a range rule. Either bound may be open.
    pub fn new(
        id: impl Into<String>,
        column: impl Into<String>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Self {
        Self {
            base: ColumnRule::new(id, column),
            min,
            max,
        }
    }
}

column_rule_builders!(RangeRule);

impl Rule for RangeRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Plausibility
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Range
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let (min, max) = (self.min, self.max);
        self.base.count(dataset, |v| match v.as_f64() {
            Some(x) => min.map_or(true, |m| x >= m) && max.map_or(true, |m| x <= m),
            None => false,
        })
    }
}

/// Values must be distinct.
#[derive(Debug, Clone)]
pub struct UniquenessRule {
    base: ColumnRule,
}

impl UniquenessRule {
    /// Creates a uniqueness rule.
    pub fn new(id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            base: ColumnRule::new(id, column),
        }
    }
}

column_rule_builders!(UniquenessRule);

impl Rule for UniquenessRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Consistency
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Uniqueness
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let mut seen = HashSet::new();
        // First occurrences pass; repeats fail.
        self.base.count(dataset, |v| seen.insert(v.to_string()))
    }
}

/// Date values must be no older than a maximum age.
#[derive(Debug, Clone)]
pub struct RecencyRule {
    base: ColumnRule,
    max_age: Duration,
    as_of: Option<DateTime<Utc>>,
}

impl RecencyRule {
    /// Creates a recency rule measured against the evaluation time.
    pub fn new(id: impl Into<String>, column: impl Into<String>, max_age: Duration) -> Self {
        Self {
            base: ColumnRule::new(id, column),
            max_age,
            as_of: None,
        }
    }

    /// Measures age against a fixed reference time.
    #[must_use]
    pub fn as_of(mut self, reference: DateTime<Utc>) -> Self {
        self.as_of = Some(reference);
        self
    }
}

column_rule_builders!(RecencyRule);

impl Rule for RecencyRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Freshness
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Recency
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let reference = self.as_of.unwrap_or_else(Utc::now);
        let oldest = reference.checked_sub_signed(self.max_age).ok_or_else(|| {
            RuleError::Evaluation(format!(
                "maximum age of {} days is out of range",
                self.max_age.num_days()
            ))
        })?;
        self.base.count(dataset, |v| {
            v.as_str()
                .and_then(crate::dataset::parse_date)
                .is_some_and(|ts| ts >= oldest)
        })
    }
}

/// Flags numeric values outside the Tukey fences (IQR method).
#[derive(Debug, Clone)]
pub struct OutlierRule {
    base: ColumnRule,
    multiplier: f64,
}

impl OutlierRule {
    /// Creates an outlier rule with the conventional 1.5 × IQR fences.
    pub fn new(id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            base: ColumnRule::new(id, column),
            multiplier: 1.5,
        }
    }

    /// Overrides the fence multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }
}

column_rule_builders!(OutlierRule);

fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

impl Rule for OutlierRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Plausibility
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Outlier
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        require_column(dataset, &self.base.id, &self.base.column)?;
        let mut numbers: Vec<f64> = dataset
            .values(&self.base.column)
            .filter_map(Value::as_f64)
            .collect();
        if numbers.len() < 4 {
            return Ok(RuleResult::from_counts(numbers.len(), numbers.len(), self.base.tolerance)
                .with_finding(format!(
                    "too few numeric values in '{}' for outlier detection",
                    self.base.column
                )));
        }
        numbers.sort_by(f64::total_cmp);
        let q1 = quantile(&numbers, 0.25);
        let q3 = quantile(&numbers, 0.75);
        let iqr = q3 - q1;
        let (low, high) = (q1 - self.multiplier * iqr, q3 + self.multiplier * iqr);
        self.base
            .count(dataset, |v| v.as_f64().is_some_and(|x| x >= low && x <= high))
            .map(|r| {
                r.with_detail("lower_fence", Value::from(low))
                    .with_detail("upper_fence", Value::from(high))
            })
    }
}

/// Values must exist in a reference dataset (foreign-key style check).
#[derive(Debug, Clone)]
pub struct ReferenceRule {
    base: ColumnRule,
    reference: String,
    keys: HashSet<String>,
}

impl ReferenceRule {
    /// Creates a cross-dataset rule checking `column` against the key set
    /// of the dataset named `reference`.
    pub fn new(
        id: impl Into<String>,
        column: impl Into<String>,
        reference: impl Into<String>,
        keys: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            base: ColumnRule::new(id, column),
            reference: reference.into(),
            keys: keys.into_iter().map(|k| reference_key(&k)).collect(),
        }
    }

    /// Name of the reference dataset.
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

column_rule_builders!(ReferenceRule);

fn reference_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Rule for ReferenceRule {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Consistency
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::CrossDataset
    }

    fn provenance(&self) -> Provenance {
        self.base.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let keys = &self.keys;
        self.base
            .count(dataset, |v| keys.contains(&reference_key(v)))
            .map(|r| r.with_detail("reference", Value::from(self.reference.clone())))
    }
}

/// Record-level predicate.
pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// A rule defined by a predicate over whole records.
///
/// Used for cross-field consistency checks and for domain business logic.
/// Rows where every value is missing are skipped.
#[derive(Clone)]
pub struct PredicateRule {
    id: String,
    dimension: Dimension,
    category: RuleCategory,
    provenance: Provenance,
    tolerance: f64,
    predicate: RecordPredicate,
}

impl PredicateRule {
    /// Cross-field consistency check.
    pub fn cross_field<F>(id: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            dimension: Dimension::Consistency,
            category: RuleCategory::CrossField,
            provenance: Provenance::Explicit,
            tolerance: DEFAULT_TOLERANCE,
            predicate: Arc::new(predicate),
        }
    }

    /// Domain-specific business rule contributing to `dimension`.
    pub fn domain<F>(id: impl Into<String>, dimension: Dimension, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            dimension,
            category: RuleCategory::DomainSpecific,
            provenance: Provenance::Explicit,
            tolerance: DEFAULT_TOLERANCE,
            predicate: Arc::new(predicate),
        }
    }

    /// Overrides the tolerated failure rate.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.clamp(0.0, 1.0);
        self
    }
}

impl Rule for PredicateRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> Dimension {
        self.dimension
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn provenance(&self) -> Provenance {
        self.provenance
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError> {
        let rows: Vec<&Record> = dataset
            .rows
            .iter()
            .filter(|row| row.values().any(|v| !is_missing(v)))
            .collect();
        let passed = rows.iter().filter(|row| (self.predicate)(row)).count();
        let mut result = RuleResult::from_counts(passed, rows.len(), self.tolerance);
        if passed < rows.len() {
            result = result.with_finding(format!(
                "{} of {} records violate {}",
                rows.len() - passed,
                rows.len(),
                self.id
            ));
        }
        Ok(result)
    }
}

/// Counts distinct rendered values; used by inference.
pub(crate) fn distinct_values<'a>(values: impl Iterator<Item = &'a Value>) -> HashMap<String, Value> {
    let mut distinct = HashMap::new();
    for v in values {
        distinct.entry(v.to_string()).or_insert_with(|| v.clone());
    }
    distinct
}
