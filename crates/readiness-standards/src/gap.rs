//! Gaps between an assessment and a standard.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How serious a gap is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic shortfall.
    Low,
    /// Worth fixing soon.
    Medium,
    /// Must be fixed before relying on the data.
    High,
    /// Prevents certification outright.
    Blocking,
}

impl Severity {
    /// Bands a gap measured in points of the 100-point scale.
    ///
    /// | Size  | Severity |
    /// |-------|----------|
    /// | ≥ 40  | blocking |
    /// | ≥ 20  | high     |
    /// | ≥ 10  | medium   |
    /// | < 10  | low      |
    pub fn from_gap_size(size: f64) -> Self {
        if size >= 40.0 {
            Severity::Blocking
        } else if size >= 20.0 {
            Severity::High
        } else if size >= 10.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Returns true for [`Severity::Blocking`].
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Blocking)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Blocking => write!(f, "blocking"),
        }
    }
}

/// Which kind of requirement a gap belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// `overall_minimum`.
    OverallScore,
    /// A dimension's `minimum_score`.
    DimensionScore,
    /// An entry of `required_rules`.
    RequiredRule,
    /// `max_missing_percentage`.
    MissingPercentage,
    /// A required dimension absent from the assessment.
    MissingDimension,
    /// An entry of `mandatory_fields`.
    MandatoryField,
    /// An entry of `custom_rules`.
    CustomRule,
}

/// One unmet requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Identifies the requirement, e.g. `overall_score`.
    pub requirement_id: String,
    /// Kind of requirement.
    pub requirement_type: RequirementType,
    /// What is wrong.
    pub description: String,
    /// What the standard demands.
    pub expected_value: Value,
    /// What the assessment found.
    pub actual_value: Value,
    /// How serious the gap is.
    pub severity: Severity,
    /// How to close the gap.
    pub remediation_hint: String,
}

/// Dimension gaps are measured out of 20; bands are defined out of 100.
pub const DIMENSION_GAP_SCALE: f64 = 5.0;

impl Gap {
    /// `|expected − actual|` on the 100-point scale when both are numeric,
    /// else 0. Dimension score gaps are scaled by [`DIMENSION_GAP_SCALE`].
    pub fn gap_size(&self) -> f64 {
        match (self.expected_value.as_f64(), self.actual_value.as_f64()) {
            (Some(expected), Some(actual)) => {
                let size = (expected - actual).abs();
                if self.requirement_type == RequirementType::DimensionScore {
                    size * DIMENSION_GAP_SCALE
                } else {
                    size
                }
            }
            _ => 0.0,
        }
    }
}
