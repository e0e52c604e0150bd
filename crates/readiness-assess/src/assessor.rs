//! Per-dimension scoring.
//!
//! A [`DimensionAssessor`] turns the rule outcomes for one dimension into a
//! 0–20 [`DimensionScore`]. The score rewards *having* well-formed,
//! explicitly communicated rules as much as it rewards the data passing
//! them:
//!
//! | Component                | Max | Earned by                                   |
//! |--------------------------|-----|---------------------------------------------|
//! | `rules_defined`          | 3   | up to five counted rules                    |
//! | `rule_types`             | 3   | a rule of a category natural to the dimension |
//! | `rule_validity`          | 4   | counted rules holding                       |
//! | `cross_dataset`          | 3   | cross-dataset or business-logic checks      |
//! | `explicit_communication` | 6   | explicitly declared rules                   |
//!
//! Which rules are *counted* depends on the [`ModeConfig`]: when explicit
//! metadata is required, inferred rules earn nothing.

use tracing::debug;

use crate::dimension::{Dimension, DimensionScore, RuleSummary, DIMENSION_MAX_SCORE};
use crate::mode::{AssessmentMode, ModeConfig};
use crate::rule::{Provenance, RuleOutcome};

/// Component names, in report order.
pub const COMPONENTS: [&str; 5] = [
    "rules_defined",
    "rule_types",
    "rule_validity",
    "cross_dataset",
    "explicit_communication",
];

const RULES_DEFINED_MAX: f64 = 3.0;
const RULE_TYPES_MAX: f64 = 3.0;
const RULE_VALIDITY_MAX: f64 = 4.0;
const CROSS_DATASET_MAX: f64 = 3.0;
const EXPLICIT_MAX: f64 = 6.0;

/// Rules beyond this count earn no further `rules_defined` credit.
const RULES_FOR_FULL_CREDIT: usize = 5;

/// Scores one dimension.
#[derive(Debug, Clone, Copy)]
pub struct DimensionAssessor {
    dimension: Dimension,
}

impl DimensionAssessor {
    /// Creates an assessor for `dimension`.
    pub fn new(dimension: Dimension) -> Self {
        Self { dimension }
    }

    /// One assessor per dimension, in canonical order.
    pub fn all() -> [DimensionAssessor; 5] {
        Dimension::ALL.map(DimensionAssessor::new)
    }

    /// The dimension this assessor scores.
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Scores the outcomes belonging to this dimension. Outcomes for other
    /// dimensions are ignored. Never fails.
    pub fn assess(&self, outcomes: &[RuleOutcome], config: &ModeConfig) -> DimensionScore {
        let dim = self.dimension;
        let mine: Vec<&RuleOutcome> = outcomes.iter().filter(|o| o.dimension == dim).collect();
        let counted: Vec<&RuleOutcome> =
            mine.iter().copied().filter(|o| config.counts(o.provenance)).collect();

        let mut score = DimensionScore {
            dimension: dim,
            score: 0.0,
            findings: Vec::new(),
            recommendations: Vec::new(),
            score_components: COMPONENTS.iter().map(|c| (c.to_string(), 0.0)).collect(),
            rules: Vec::new(),
            metrics: Default::default(),
        };

        if counted.is_empty() {
            if !mine.is_empty() && config.mode != AssessmentMode::Validation {
                score.recommendations.push(format!(
                    "Declare {dim} rules explicitly in machine-readable metadata"
                ));
            }
            score.recommendations.push(format!("Implement {dim} rules"));
            debug!("{}: no counted rules ({} ignored)", dim, mine.len());
            return score;
        }

        let explicit = counted
            .iter()
            .filter(|o| o.provenance == Provenance::Explicit)
            .count();
        let inferred = counted.len() - explicit;
        let invalid: Vec<&str> = counted
            .iter()
            .filter(|o| !o.result.valid)
            .map(|o| o.rule_id.as_str())
            .collect();

        let rules_defined = (counted.len().min(RULES_FOR_FULL_CREDIT) as f64 * RULES_DEFINED_MAX
            / RULES_FOR_FULL_CREDIT as f64)
            .floor();

        let appropriate = dim.appropriate_categories();
        let rule_types = if counted.iter().any(|o| appropriate.contains(&o.category)) {
            RULE_TYPES_MAX
        } else {
            0.0
        };

        let invalid_fraction = invalid.len() as f64 / counted.len() as f64;
        let rule_validity = if invalid.is_empty() {
            RULE_VALIDITY_MAX
        } else if invalid_fraction < 0.25 {
            3.0
        } else if invalid_fraction < 0.5 {
            2.0
        } else if invalid.len() < counted.len() {
            1.0
        } else {
            0.0
        };

        let cross_dataset = if counted.iter().any(|o| {
            o.category.is_cross_dataset()
                || (o.category.is_domain_specific() && config.business_logic_enabled)
        }) {
            CROSS_DATASET_MAX
        } else {
            0.0
        };

        let explicit_communication = if explicit > 0 {
            EXPLICIT_MAX
        } else if config.allow_inferred_metadata {
            (0.5 * inferred as f64).min(2.0)
        } else {
            0.0
        };

        let components = [
            rules_defined,
            rule_types,
            rule_validity,
            cross_dataset,
            explicit_communication,
        ];
        for (name, value) in COMPONENTS.iter().zip(components) {
            score.score_components.insert(name.to_string(), value);
        }
        score.score = components.iter().sum::<f64>().min(DIMENSION_MAX_SCORE);

        for outcome in &counted {
            if outcome.category.is_domain_specific() && !config.business_logic_enabled {
                continue;
            }
            score.findings.extend(outcome.result.findings.iter().cloned());
        }
        score.rules = counted
            .iter()
            .map(|o| RuleSummary {
                rule_id: o.rule_id.clone(),
                category: o.category,
                provenance: o.provenance,
                valid: o.result.valid,
                score: o.result.score,
            })
            .collect();

        if rules_defined < RULES_DEFINED_MAX {
            score.recommendations.push(format!(
                "Define at least {RULES_FOR_FULL_CREDIT} {dim} rules (currently {})",
                counted.len()
            ));
        }
        if rule_types == 0.0 {
            let names: Vec<String> = appropriate.iter().map(|c| c.to_string()).collect();
            score.recommendations.push(format!(
                "Add a {dim} rule of category {}",
                names.join(", ")
            ));
        }
        if !invalid.is_empty() {
            score.recommendations.push(format!(
                "Fix failing {dim} rules: {}",
                invalid.join(", ")
            ));
        }
        if cross_dataset == 0.0 {
            score
                .recommendations
                .push(format!("Add cross-dataset {dim} checks"));
        }
        if explicit == 0 && config.mode != AssessmentMode::Validation {
            score.recommendations.push(format!(
                "Declare {dim} rules explicitly in machine-readable metadata"
            ));
        }

        debug!(
            "{}: {:.1}/20 from {} rules ({} invalid)",
            dim,
            score.score,
            counted.len(),
            invalid.len()
        );
        score
    }
}
