//! Draft standards from discovery assessments.
//!
//! A suggested standard captures the quality level a dataset already
//! reaches, so the data owner can adopt it as a baseline and tighten it
//! over time. The current data is always compliant with its own
//! suggestion.

use readiness_assess::{AssessmentResult, Dimension};
use tracing::debug;

use crate::models::{DimensionRequirement, StandardDefinition};
use crate::Result;

/// Overall minimums are rounded down to a multiple of this.
const OVERALL_STEP: f64 = 5.0;

/// Builds a draft standard from an assessment.
///
/// | Requirement              | Derived from                                  |
/// |--------------------------|-----------------------------------------------|
/// | `overall_minimum`        | overall score, rounded down to a multiple of 5 |
/// | `minimum_score`          | each dimension score, rounded down            |
/// | `required_rules`         | rules that currently hold                     |
/// | `max_missing_percentage` | measured missing percentage, rounded up       |
/// | `mandatory_fields`       | columns with no missing values                |
pub fn suggest_standard(result: &AssessmentResult, id: impl Into<String>) -> StandardDefinition {
    let source = result.data_source.as_deref().unwrap_or("dataset");
    let mut standard = StandardDefinition::new(id, "0.1.0")
        .with_name(format!("Suggested standard for {source}"))
        .with_authority("draft")
        .with_overall_minimum((result.overall_score / OVERALL_STEP).floor() * OVERALL_STEP);

    for (dim, score) in &result.dimension_scores {
        let mut requirement = DimensionRequirement {
            minimum_score: Some(score.score.floor()),
            required_rules: score
                .rules
                .iter()
                .filter(|r| r.valid)
                .map(|r| r.rule_id.clone())
                .collect(),
            max_missing_percentage: None,
        };
        if *dim == Dimension::Completeness {
            requirement.max_missing_percentage = score.metric("missing_percentage").map(f64::ceil);
        }
        standard = standard.with_dimension(*dim, requirement);
    }

    let info = &result.data_info;
    for column in &info.columns {
        if info.row_count > 0 && info.non_null_counts.get(column) == Some(&info.row_count) {
            standard = standard.with_mandatory_field(column.clone());
        }
    }

    debug!(
        "Suggested standard {} with {} mandatory fields",
        standard.id,
        standard.requirements.mandatory_fields.len()
    );
    standard
}

/// Renders a standard as a YAML document the loader accepts.
pub fn to_yaml(standard: &StandardDefinition) -> Result<String> {
    Ok(serde_yaml::to_string(standard)?)
}
