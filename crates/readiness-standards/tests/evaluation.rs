//! # Evaluation Tests
//!
//! Standards loaded from YAML and evaluated against real assessments.

use proptest::prelude::*;
use readiness_assess::rule::builtin::{NotNullRule, PatternRule, UniquenessRule};
use readiness_assess::{
    AggregatorConfig, AssessmentMode, AssessmentResult, Dataset, Dimension, Record, RuleRegistry,
    ScoreAggregator,
};
use readiness_standards::{
    Gap, RemediationEffort, RequirementType, Severity, StandardDefinition, StandardError,
    StandardLoader, TemplateEvaluation, TemplateEvaluator, MAX_NESTING,
};
use serde_json::json;

const CUSTOMER_STANDARD: &str = r#"
standards:
  id: customer_v1
  name: Customer master data
  version: 1.0.0
  authority: Data Office
requirements:
  overall_minimum: 35
  dimension_requirements:
    validity:
      minimum_score: 10
      required_rules: [email_format]
    completeness:
      minimum_score: 10
      max_missing_percentage: 10
  mandatory_fields: [customer_id, email]
  custom_rules:
    - id: has_rows
      expression: "row_count >= 10"
"#;

fn customers(broken_emails: usize) -> Dataset {
    let rows = (0..20)
        .map(|i| {
            let email = if i < broken_emails {
                json!("not-an-email")
            } else {
                json!(format!("user{i}@example.com"))
            };
            serde_json::from_value::<Record>(json!({
                "customer_id": i,
                "email": email,
                "city": "Oslo",
            }))
            .unwrap()
        })
        .collect();
    Dataset::from_records(rows).with_source("customers")
}

fn assess(dataset: &Dataset) -> AssessmentResult {
    let registry = RuleRegistry::new()
        .with_rule(PatternRule::new("email_format", "email", r"^[^@\s]+@[^@\s]+\.[a-z]+$").unwrap())
        .with_rule(NotNullRule::new("email_required", "email"))
        .with_rule(NotNullRule::new("id_required", "customer_id"))
        .with_rule(UniquenessRule::new("id_unique", "customer_id"));
    ScoreAggregator::new(registry)
        .with_config(AggregatorConfig {
            mode: AssessmentMode::Validation,
            ..Default::default()
        })
        .assess_with_standard(dataset, Some("customer_v1"))
}

fn standard() -> StandardDefinition {
    StandardLoader::new().unwrap().load_str(CUSTOMER_STANDARD).unwrap()
}

// ============================================================================
// Loaded standards against real assessments
// ============================================================================

#[test]
fn test_clean_data_is_compliant() {
    let result = assess(&customers(0));
    let eval = TemplateEvaluator::new().evaluate(&result, &standard());
    assert!(eval.compliant, "gaps: {:?}", eval.gaps);
    assert!(eval.certification_eligible);
    assert_eq!(eval.compliance_score, 100.0);
    assert_eq!(eval.standard_id, "customer_v1");
    assert_eq!(eval.standard_version, "1.0.0");
}

#[test]
fn test_failing_required_rule_is_high_gap() {
    let result = assess(&customers(3));
    let eval = TemplateEvaluator::new().evaluate(&result, &standard());
    let gap = eval
        .gaps
        .iter()
        .find(|g| g.requirement_type == RequirementType::RequiredRule)
        .unwrap();
    assert_eq!(gap.requirement_id, "validity_rule_email_format");
    assert_eq!(gap.severity, Severity::High);
    assert!(!eval.compliant);
    assert!(eval.certification_eligible);
    assert_eq!(eval.estimated_remediation_effort, RemediationEffort::Medium);
}

#[test]
fn test_missing_mandatory_field_blocks_certification() {
    let mut dataset = customers(0);
    dataset.columns.retain(|c| c != "email");
    for row in &mut dataset.rows {
        row.remove("email");
    }
    let result = assess(&dataset);
    let eval = TemplateEvaluator::new().evaluate(&result, &standard());
    assert!(!eval.certification_eligible);
    assert!(eval
        .certification_blockers
        .iter()
        .any(|b| b.contains("'email' is missing")));
    assert_eq!(eval.remediation_plan[0].severity, Severity::Blocking);
}

// ============================================================================
// Scenario: overall minimum 80, actual 70
// ============================================================================

#[test]
fn test_overall_shortfall_single_gap() {
    let mut result = assess(&customers(0));
    result.overall_score = 70.0;
    let std = StandardDefinition::new("strict", "1").with_overall_minimum(80.0);
    let eval = TemplateEvaluator::new().evaluate(&result, &std);
    assert_eq!(eval.gaps.len(), 1);
    assert_eq!(eval.gaps[0].requirement_id, "overall_score");
    assert_eq!(eval.gaps[0].gap_size(), 10.0);
    assert!(!eval.compliant);
}

#[test]
fn test_evaluation_is_idempotent() {
    let result = assess(&customers(5));
    let std = standard();
    let evaluator = TemplateEvaluator::new();
    let first = evaluator.evaluate(&result, &std);
    let second = evaluator.evaluate(&result, &std);
    assert_eq!(first.gaps, second.gaps);
    assert_eq!(first.compliance_score, second.compliance_score);
    assert_eq!(first, second);
}

#[test]
fn test_unassessed_dimension_is_blocking() {
    let mut result = assess(&customers(0));
    result.dimension_scores.remove(&Dimension::Completeness);
    let eval = TemplateEvaluator::new().evaluate(&result, &standard());
    assert!(eval
        .gaps
        .iter()
        .any(|g| g.requirement_id == "completeness_present" && g.severity == Severity::Blocking));
}

// ============================================================================
// Properties
// ============================================================================

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(vec![Severity::Low, Severity::Medium, Severity::High, Severity::Blocking])
}

fn arb_gap() -> impl Strategy<Value = Gap> {
    ("[a-z]{1,6}", arb_severity(), 0.0f64..100.0, 0.0f64..100.0).prop_map(
        |(id, severity, expected, actual)| Gap {
            requirement_id: id.clone(),
            requirement_type: RequirementType::DimensionScore,
            description: format!("{id} gap"),
            expected_value: json!(expected),
            actual_value: json!(actual),
            severity,
            remediation_hint: String::new(),
        },
    )
}

proptest! {
    #[test]
    fn finalize_invariants(
        gaps in prop::collection::vec(arb_gap(), 0..12),
        passed in 0usize..12,
    ) {
        let mut eval = TemplateEvaluation::new("s", "1");
        for i in 0..passed {
            eval.add_passed_requirement(format!("ok_{i}"));
        }
        for gap in gaps.iter().cloned() {
            eval.add_gap(gap);
        }
        eval.finalize();

        prop_assert_eq!(eval.compliant, eval.gaps.is_empty());
        let blocking = eval.gaps.iter().any(|g| g.severity == Severity::Blocking);
        prop_assert_eq!(eval.certification_eligible, !blocking);
        prop_assert!(eval.compliance_score >= 0.0 && eval.compliance_score <= 100.0);
        prop_assert_eq!(eval.remediation_plan.len(), eval.gaps.len());
        for pair in eval.remediation_plan.windows(2) {
            prop_assert!(pair[0].severity >= pair[1].severity);
            if pair[0].severity == pair[1].severity {
                prop_assert!(pair[0].gap_size >= pair[1].gap_size);
            }
        }

        let snapshot = eval.clone();
        eval.finalize();
        prop_assert_eq!(eval, snapshot);
    }
}

// ============================================================================
// Hostile custom-rule expressions
// ============================================================================

fn with_expression(expression: &str) -> String {
    CUSTOMER_STANDARD.replace("row_count >= 10", expression)
}

#[test]
fn test_nesting_limit_applies_to_every_prefix() {
    let loader = StandardLoader::new().unwrap();
    let cases = [
        format!("{}row_count > 1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1)),
        format!("{}true", "not ".repeat(MAX_NESTING + 1)),
        format!("{}row_count < 0", "-".repeat(MAX_NESTING + 1)),
        format!("{}true", "! ".repeat(50_000)),
    ];
    for expression in cases {
        let result = loader.load_str(&with_expression(&expression));
        assert!(
            matches!(result, Err(StandardError::Configuration(_))),
            "accepted {} bytes of nesting",
            expression.len()
        );
    }
    let shallow = format!("{}row_count > 1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
    assert!(loader.load_str(&with_expression(&shallow)).is_ok());
}

#[test]
fn test_long_flat_expression_rejected() {
    let expression = format!("row_count{} > 0", " + 1".repeat(100_000));
    let result = StandardLoader::new().unwrap().load_str(&with_expression(&expression));
    assert!(matches!(result, Err(StandardError::Configuration(_))));
}

proptest! {
    #[test]
    fn arbitrary_expressions_never_crash_the_loader(
        expression in "[()!<>=&|+*/ 0-9.a-z_-]{0,400}",
    ) {
        let loader = StandardLoader::new().unwrap();
        match loader.load_str(&with_expression(&expression)) {
            Ok(standard) => prop_assert_eq!(standard.requirements.custom_rules.len(), 1),
            Err(StandardError::Configuration(_))
            | Err(StandardError::Security(_))
            | Err(StandardError::Parse(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn nested_prefixes_beyond_limit_are_rejected(
        depth in (MAX_NESTING + 1)..5_000usize,
        prefix in prop::sample::select(vec!["(", "not ", "-"]),
    ) {
        let closing = if prefix == "(" { ")".repeat(depth) } else { String::new() };
        let expression = format!("{}row_count{}", prefix.repeat(depth), closing);
        let result = StandardLoader::new().unwrap().load_str(&with_expression(&expression));
        prop_assert!(matches!(result, Err(StandardError::Configuration(_))));
    }
}
