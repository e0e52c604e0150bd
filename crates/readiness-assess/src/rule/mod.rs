//! Rule framework.
//!
//! A [`Rule`] inspects a [`Dataset`] and reports a [`RuleResult`]. Rules
//! are composed per assessment in an explicit [`RuleRegistry`]; there is
//! no global registry.

pub mod builtin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::dataset::Dataset;
use crate::dimension::Dimension;
use crate::error::RuleError;

/// Kind of check a rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Value type conformance.
    Type,
    /// String format (pattern) conformance.
    Format,
    /// Membership in an enumeration.
    Enumeration,
    /// Presence of required values.
    Required,
    /// Distinct values.
    Uniqueness,
    /// Agreement between fields of the same record.
    CrossField,
    /// Agreement with another dataset.
    CrossDataset,
    /// Age of time-bound values.
    Recency,
    /// Numeric bounds.
    Range,
    /// Statistical outlier detection.
    Outlier,
    /// Business logic specific to a domain.
    DomainSpecific,
    /// Anything else.
    Other,
}

impl RuleCategory {
    /// True for checks against other datasets.
    pub fn is_cross_dataset(&self) -> bool {
        matches!(self, RuleCategory::CrossDataset)
    }

    /// True for business-logic checks.
    pub fn is_domain_specific(&self) -> bool {
        matches!(self, RuleCategory::DomainSpecific)
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleCategory::Type => "type",
            RuleCategory::Format => "format",
            RuleCategory::Enumeration => "enumeration",
            RuleCategory::Required => "required",
            RuleCategory::Uniqueness => "uniqueness",
            RuleCategory::CrossField => "cross_field",
            RuleCategory::CrossDataset => "cross_dataset",
            RuleCategory::Recency => "recency",
            RuleCategory::Range => "range",
            RuleCategory::Outlier => "outlier",
            RuleCategory::DomainSpecific => "domain_specific",
            RuleCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// Whether a rule was declared by the data owner or inferred from data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Declared explicitly and machine-readably.
    Explicit,
    /// Derived automatically from the data.
    Inferred,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Explicit => write!(f, "explicit"),
            Provenance::Inferred => write!(f, "inferred"),
        }
    }
}

/// Output contract of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Pass ratio in `[0, 1]`.
    pub score: f64,
    /// Whether the rule held within its tolerance.
    pub valid: bool,
    /// Human-readable findings.
    pub findings: Vec<String>,
    /// Structured details (counts, offending values).
    pub details: BTreeMap<String, Value>,
}

impl RuleResult {
    /// Creates a result, clamping the score into `[0, 1]`.
    pub fn new(score: f64, valid: bool) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            score,
            valid,
            findings: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    /// Builds a result from pass/total counts.
    ///
    /// The rule is valid when the failure rate does not exceed `tolerance`.
    /// A rule with nothing to check passes vacuously.
    pub fn from_counts(passed: usize, total: usize, tolerance: f64) -> Self {
        let passed = passed.min(total);
        let (score, failure_rate) = if total == 0 {
            (1.0, 0.0)
        } else {
            let ratio = passed as f64 / total as f64;
            (ratio, 1.0 - ratio)
        };
        Self::new(score, failure_rate <= tolerance)
            .with_detail("passed", Value::from(passed))
            .with_detail("failed", Value::from(total - passed))
            .with_detail("total", Value::from(total))
    }

    /// A rule that could not be evaluated.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new(0.0, false).with_finding(reason)
    }

    /// Adds a finding.
    #[must_use]
    pub fn with_finding(mut self, finding: impl Into<String>) -> Self {
        self.findings.push(finding.into());
        self
    }

    /// Adds a structured detail.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// Number of failing items, when recorded.
    pub fn failed_count(&self) -> usize {
        self.details
            .get("failed")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(0)
    }
}

/// Trait for pluggable data-quality rules.
///
/// # Implementors
///
/// See [`builtin`] for the rules shipped with the engine.
pub trait Rule: Send + Sync {
    /// Unique identifier within an assessment.
    fn id(&self) -> &str;

    /// Dimension this rule contributes to.
    fn dimension(&self) -> Dimension;

    /// Kind of check performed.
    fn category(&self) -> RuleCategory;

    /// Whether the rule was declared or inferred.
    fn provenance(&self) -> Provenance {
        Provenance::Explicit
    }

    /// Inspects the dataset.
    fn evaluate(&self, dataset: &Dataset) -> Result<RuleResult, RuleError>;
}

/// A rule's result together with the rule's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Rule identifier.
    pub rule_id: String,
    /// Dimension the rule contributes to.
    pub dimension: Dimension,
    /// Kind of check.
    pub category: RuleCategory,
    /// Declared or inferred.
    pub provenance: Provenance,
    /// What the rule reported.
    pub result: RuleResult,
}

impl RuleOutcome {
    /// Runs a rule. Errors degrade to a zero-score, invalid result.
    pub fn from_rule(rule: &dyn Rule, dataset: &Dataset) -> Self {
        let result = match rule.evaluate(dataset) {
            Ok(result) => result,
            Err(e) => {
                debug!("Rule '{}' degraded to zero: {}", rule.id(), e);
                RuleResult::failed(e.to_string())
            }
        };
        Self {
            rule_id: rule.id().to_string(),
            dimension: rule.dimension(),
            category: rule.category(),
            provenance: rule.provenance(),
            result,
        }
    }
}

/// Rules composed for an assessment.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    pub fn register(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Arc::new(rule));
    }

    /// Adds a shared rule.
    pub fn register_shared(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.register(rule);
        self
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates the registered rules.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter()
    }

    /// Evaluates every rule against the dataset.
    pub fn evaluate_all(&self, dataset: &Dataset) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .map(|rule| RuleOutcome::from_rule(rule.as_ref(), dataset))
            .collect()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Rule for Broken {
        fn id(&self) -> &str {
            "broken"
        }
        fn dimension(&self) -> Dimension {
            Dimension::Validity
        }
        fn category(&self) -> RuleCategory {
            RuleCategory::Other
        }
        fn evaluate(&self, _dataset: &Dataset) -> Result<RuleResult, RuleError> {
            Err(RuleError::Evaluation("boom".to_string()))
        }
    }

    #[test]
    fn test_from_counts_valid_within_tolerance() {
        let r = RuleResult::from_counts(96, 100, 0.05);
        assert!(r.valid);
        assert!((r.score - 0.96).abs() < 1e-9);
        assert_eq!(r.failed_count(), 4);
    }

    #[test]
    fn test_from_counts_invalid_beyond_tolerance() {
        let r = RuleResult::from_counts(90, 100, 0.05);
        assert!(!r.valid);
    }

    #[test]
    fn test_from_counts_vacuous() {
        let r = RuleResult::from_counts(0, 0, 0.0);
        assert!(r.valid);
        assert_eq!(r.score, 1.0);
    }

    #[test]
    fn test_new_clamps_score() {
        assert_eq!(RuleResult::new(3.0, true).score, 1.0);
        assert_eq!(RuleResult::new(-1.0, true).score, 0.0);
        assert_eq!(RuleResult::new(f64::NAN, true).score, 0.0);
    }

    #[test]
    fn test_rule_error_degrades_to_zero() {
        let outcome = RuleOutcome::from_rule(&Broken, &Dataset::default());
        assert_eq!(outcome.result.score, 0.0);
        assert!(!outcome.result.valid);
        assert!(outcome.result.findings[0].contains("boom"));
    }

    #[test]
    fn test_registry_evaluate_all() {
        let registry = RuleRegistry::new().with_rule(Broken).with_rule(Broken);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.evaluate_all(&Dataset::default()).len(), 2);
    }
}
