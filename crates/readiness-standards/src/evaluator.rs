//! Evaluates an assessment against a standard.

use readiness_assess::{AssessmentResult, Dimension};
use serde_json::{json, Value};
use tracing::debug;

use crate::evaluation::TemplateEvaluation;
use crate::expression::{Expr, ExpressionContext};
use crate::gap::{Gap, RequirementType, Severity, DIMENSION_GAP_SCALE};
use crate::models::{DimensionRequirement, StandardDefinition};

/// Compares assessments with standards.
///
/// Pure: evaluating the same inputs twice yields identical gaps and
/// compliance scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    /// Creates an evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Checks, in order: overall minimum, dimension requirements,
    /// mandatory fields, custom rules.
    pub fn evaluate(&self, result: &AssessmentResult, standard: &StandardDefinition) -> TemplateEvaluation {
        let mut eval = TemplateEvaluation::new(&standard.id, &standard.version);
        let req = &standard.requirements;

        if let Some(minimum) = req.overall_minimum {
            self.check_overall(&mut eval, result.overall_score, minimum);
        }

        for (dim, requirement) in &req.dimension_requirements {
            self.check_dimension(&mut eval, result, *dim, requirement);
        }

        for field in &req.mandatory_fields {
            let id = format!("mandatory_field_{field}");
            let present = result.data_info.columns.iter().any(|c| c == field);
            if present && result.data_info.has_values(field) {
                eval.add_passed_requirement(id);
                continue;
            }
            let (description, actual) = if present {
                (format!("Mandatory field '{field}' has no values"), json!("all null"))
            } else {
                (format!("Mandatory field '{field}' is missing"), json!("absent"))
            };
            eval.add_gap(Gap {
                requirement_id: id,
                requirement_type: RequirementType::MandatoryField,
                description,
                expected_value: json!("present"),
                actual_value: actual,
                severity: Severity::Blocking,
                remediation_hint: format!("Populate the '{field}' column for every record"),
            });
        }

        if !req.custom_rules.is_empty() {
            let ctx = ExpressionContext::from_assessment(result);
            for rule in &req.custom_rules {
                let id = format!("custom_rule_{}", rule.id);
                let outcome = Expr::parse(&rule.expression).and_then(|e| e.eval_bool(&ctx));
                match outcome {
                    Ok(true) => eval.add_passed_requirement(id),
                    Ok(false) => eval.add_gap(Gap {
                        requirement_id: id,
                        requirement_type: RequirementType::CustomRule,
                        description: if rule.description.is_empty() {
                            format!("Custom rule '{}' not satisfied", rule.id)
                        } else {
                            rule.description.clone()
                        },
                        expected_value: json!(rule.expression),
                        actual_value: json!(false),
                        severity: rule.severity,
                        remediation_hint: format!("Satisfy `{}`", rule.expression),
                    }),
                    Err(e) => eval.add_gap(Gap {
                        requirement_id: id,
                        requirement_type: RequirementType::CustomRule,
                        description: format!("Custom rule '{}' could not be evaluated: {e}", rule.id),
                        expected_value: json!(rule.expression),
                        actual_value: Value::Null,
                        severity: rule.severity,
                        remediation_hint: format!("Fix the expression of custom rule '{}'", rule.id),
                    }),
                }
            }
        }

        eval.finalize();
        debug!(
            "Evaluated against {} v{}: {} gaps, {:.1}% compliant",
            standard.id,
            standard.version,
            eval.gaps.len(),
            eval.compliance_score
        );
        eval
    }

    fn check_overall(&self, eval: &mut TemplateEvaluation, actual: f64, minimum: f64) {
        if actual >= minimum {
            eval.add_passed_requirement("overall_score");
            return;
        }
        eval.add_gap(Gap {
            requirement_id: "overall_score".to_string(),
            requirement_type: RequirementType::OverallScore,
            description: format!("Overall score {actual:.1} is below the minimum {minimum:.1}"),
            expected_value: json!(minimum),
            actual_value: json!(actual),
            severity: Severity::from_gap_size(minimum - actual),
            remediation_hint: "Raise the weakest dimension scores".to_string(),
        });
    }

    fn check_dimension(
        &self,
        eval: &mut TemplateEvaluation,
        result: &AssessmentResult,
        dim: Dimension,
        requirement: &DimensionRequirement,
    ) {
        let Some(score) = result.dimension(dim) else {
            eval.add_gap(Gap {
                requirement_id: format!("{dim}_present"),
                requirement_type: RequirementType::MissingDimension,
                description: format!("Dimension {dim} was not assessed"),
                expected_value: json!("assessed"),
                actual_value: Value::Null,
                severity: Severity::Blocking,
                remediation_hint: format!("Assess the {dim} dimension"),
            });
            return;
        };

        if let Some(minimum) = requirement.minimum_score {
            let id = format!("{dim}_minimum_score");
            if score.score >= minimum {
                eval.add_passed_requirement(id);
            } else {
                eval.add_gap(Gap {
                    requirement_id: id,
                    requirement_type: RequirementType::DimensionScore,
                    description: format!(
                        "{dim} score {:.1} is below the minimum {minimum:.1}",
                        score.score
                    ),
                    expected_value: json!(minimum),
                    actual_value: json!(score.score),
                    severity: Severity::from_gap_size((minimum - score.score) * DIMENSION_GAP_SCALE),
                    remediation_hint: score
                        .recommendations
                        .first()
                        .cloned()
                        .unwrap_or_else(|| format!("Strengthen {dim} rules")),
                });
            }
        }

        for rule_id in &requirement.required_rules {
            let id = format!("{dim}_rule_{rule_id}");
            match score.rule(rule_id) {
                Some(rule) if rule.valid => eval.add_passed_requirement(id),
                found => {
                    let (description, actual, hint) = match found {
                        Some(_) => (
                            format!("Required {dim} rule '{rule_id}' failed"),
                            json!("invalid"),
                            format!("Fix the data violating '{rule_id}'"),
                        ),
                        None => (
                            format!("Required {dim} rule '{rule_id}' is not defined"),
                            json!("absent"),
                            format!("Define rule '{rule_id}' for {dim}"),
                        ),
                    };
                    eval.add_gap(Gap {
                        requirement_id: id,
                        requirement_type: RequirementType::RequiredRule,
                        description,
                        expected_value: json!("valid"),
                        actual_value: actual,
                        severity: Severity::High,
                        remediation_hint: hint,
                    });
                }
            }
        }

        if let Some(max) = requirement.max_missing_percentage {
            let id = format!("{dim}_max_missing_percentage");
            let missing = result
                .dimension(Dimension::Completeness)
                .and_then(|c| c.metric("missing_percentage"));
            match missing {
                Some(actual) if actual <= max => eval.add_passed_requirement(id),
                Some(actual) => eval.add_gap(Gap {
                    requirement_id: id,
                    requirement_type: RequirementType::MissingPercentage,
                    description: format!("{actual:.1}% of values are missing (limit {max:.1}%)"),
                    expected_value: json!(max),
                    actual_value: json!(actual),
                    severity: Severity::from_gap_size(actual - max),
                    remediation_hint: "Fill or impute missing values".to_string(),
                }),
                None => eval.add_gap(Gap {
                    requirement_id: id,
                    requirement_type: RequirementType::MissingPercentage,
                    description: "Missing-value percentage was not measured".to_string(),
                    expected_value: json!(max),
                    actual_value: Value::Null,
                    severity: Severity::High,
                    remediation_hint: "Re-run the assessment to measure missing values".to_string(),
                }),
            }
        }
    }
}
