//! Quality dimensions and per-dimension scores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AssessError;
use crate::rule::{Provenance, RuleCategory};

/// Maximum score of a single dimension.
pub const DIMENSION_MAX_SCORE: f64 = 20.0;

/// Maximum overall score (five dimensions).
pub const OVERALL_MAX_SCORE: f64 = 100.0;

/// One of the five orthogonal data-quality axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Values conform to declared types, formats and enumerations.
    Validity,
    /// Required values are present.
    Completeness,
    /// Values agree with each other and with reference data.
    Consistency,
    /// Time-bound values are recent enough.
    Freshness,
    /// Values are believable (ranges, outliers).
    Plausibility,
}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Dimension; 5] = [
        Dimension::Validity,
        Dimension::Completeness,
        Dimension::Consistency,
        Dimension::Freshness,
        Dimension::Plausibility,
    ];

    /// Lowercase name used in documents and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Validity => "validity",
            Dimension::Completeness => "completeness",
            Dimension::Consistency => "consistency",
            Dimension::Freshness => "freshness",
            Dimension::Plausibility => "plausibility",
        }
    }

    /// Rule categories that count as the natural check for this dimension.
    pub fn appropriate_categories(&self) -> &'static [RuleCategory] {
        match self {
            Dimension::Validity => &[RuleCategory::Type, RuleCategory::Format, RuleCategory::Enumeration],
            Dimension::Completeness => &[RuleCategory::Required],
            Dimension::Consistency => &[
                RuleCategory::Uniqueness,
                RuleCategory::CrossField,
                RuleCategory::CrossDataset,
            ],
            Dimension::Freshness => &[RuleCategory::Recency],
            Dimension::Plausibility => &[RuleCategory::Range, RuleCategory::Outlier],
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = AssessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "validity" => Ok(Dimension::Validity),
            "completeness" => Ok(Dimension::Completeness),
            "consistency" => Ok(Dimension::Consistency),
            "freshness" => Ok(Dimension::Freshness),
            "plausibility" => Ok(Dimension::Plausibility),
            other => Err(AssessError::UnknownDimension(other.to_string())),
        }
    }
}

/// Condensed view of one rule's outcome, kept on the dimension score so
/// standards can check `required_rules` later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSummary {
    /// Rule identifier.
    pub rule_id: String,
    /// Rule category.
    pub category: RuleCategory,
    /// Explicitly declared or inferred.
    pub provenance: Provenance,
    /// Whether the rule held.
    pub valid: bool,
    /// Pass ratio in `[0, 1]`.
    pub score: f64,
}

/// Score of one dimension, 0–20, with the components it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// Which dimension this is.
    pub dimension: Dimension,
    /// Total, capped at [`DIMENSION_MAX_SCORE`].
    pub score: f64,
    /// Findings surfaced by the rules.
    pub findings: Vec<String>,
    /// What to do to raise the score.
    pub recommendations: Vec<String>,
    /// Named score components.
    pub score_components: BTreeMap<String, f64>,
    /// Rules that contributed.
    #[serde(default)]
    pub rules: Vec<RuleSummary>,
    /// Intrinsic measurements (e.g. `missing_percentage`).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl DimensionScore {
    /// Value of a named component, 0 when absent.
    pub fn component(&self, name: &str) -> f64 {
        self.score_components.get(name).copied().unwrap_or(0.0)
    }

    /// Looks up a contributing rule by id.
    pub fn rule(&self, rule_id: &str) -> Option<&RuleSummary> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    /// Looks up a metric.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Attaches a metric.
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}
