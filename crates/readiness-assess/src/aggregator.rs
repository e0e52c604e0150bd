//! Overall assessment.
//!
//! ```text
//! Dataset ──▶ resolve mode ──▶ rules (registry + declared + inferred)
//!                                   │
//!                                   ▼
//!                     DimensionAssessor ×5 ──▶ Σ ──▶ AssessmentResult
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::assessor::DimensionAssessor;
use crate::dataset::{Dataset, DatasetMetadata};
use crate::dimension::{Dimension, DimensionScore, OVERALL_MAX_SCORE};
use crate::inference::{infer_metadata, rules_from_metadata};
use crate::mode::{resolve_mode, AssessmentMode, ModeConfig};
use crate::rule::{Provenance, RuleOutcome, RuleRegistry};

/// Default score an assessment needs to be marked passed.
pub const DEFAULT_PASS_THRESHOLD: f64 = 75.0;

/// Aggregator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Requested mode; `Auto` is resolved per dataset.
    pub mode: AssessmentMode,
    /// Minimum overall score for `passed`.
    pub pass_threshold: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            mode: AssessmentMode::Auto,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

/// Shape of the assessed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInfo {
    /// Number of rows.
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// Column names.
    pub columns: Vec<String>,
    /// Non-null values per column.
    #[serde(default)]
    pub non_null_counts: BTreeMap<String, usize>,
}

impl DataInfo {
    /// Describes a dataset.
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            row_count: dataset.row_count(),
            column_count: dataset.column_count(),
            columns: dataset.columns.clone(),
            non_null_counts: dataset
                .columns
                .iter()
                .map(|c| (c.clone(), dataset.non_null_count(c)))
                .collect(),
        }
    }

    /// True if `column` exists and has at least one value.
    pub fn has_values(&self, column: &str) -> bool {
        self.non_null_counts.get(column).copied().unwrap_or(0) > 0
    }
}

/// Result of one assessment. Serializable for caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// Unique id of this assessment.
    pub assessment_id: String,
    /// Sum of dimension scores, 0–100.
    pub overall_score: f64,
    /// Score per dimension.
    pub dimension_scores: BTreeMap<Dimension, DimensionScore>,
    /// `overall_score >= pass_threshold`.
    pub passed: bool,
    /// Standard the data was assessed for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_id: Option<String>,
    /// Concrete mode used.
    pub assessment_mode: AssessmentMode,
    /// When the assessment ran.
    pub timestamp: DateTime<Utc>,
    /// Shape of the assessed data.
    pub data_info: DataInfo,
    /// Data source name, if the dataset carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Metadata inferred in discovery mode, offered to the data owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_metadata: Option<DatasetMetadata>,
}

impl AssessmentResult {
    /// Full score record of a dimension.
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimension_scores.get(&dimension)
    }

    /// Numeric score of a dimension.
    pub fn dimension_score(&self, dimension: Dimension) -> Option<f64> {
        self.dimension(dimension).map(|d| d.score)
    }

    /// Time elapsed since the assessment, as of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }
}

/// Runs rules and sums the five dimension scores.
#[derive(Debug, Clone, Default)]
pub struct ScoreAggregator {
    registry: RuleRegistry,
    config: AggregatorConfig,
}

impl ScoreAggregator {
    /// Creates an aggregator over an explicit rule registry.
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry,
            config: AggregatorConfig::default(),
        }
    }

    /// Overrides the settings.
    #[must_use]
    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Current settings.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Registered rules.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Assesses a dataset, using the standard id its metadata declares.
    pub fn assess(&self, dataset: &Dataset) -> AssessmentResult {
        self.assess_with_standard(dataset, None)
    }

    /// Assesses a dataset for a given standard.
    ///
    /// Rule sources, in order: the registry, rules derived from declared
    /// metadata (explicit), and in discovery mode without declared
    /// metadata, rules derived from inferred metadata.
    pub fn assess_with_standard(&self, dataset: &Dataset, standard_id: Option<&str>) -> AssessmentResult {
        let declared_standard = dataset.metadata.as_ref().and_then(|m| m.standard_id.as_deref());
        let standard_id = standard_id.or(declared_standard);
        let mode = resolve_mode(self.config.mode, dataset, standard_id);
        let mode_config = ModeConfig::for_mode(mode);

        let mut outcomes: Vec<RuleOutcome> = self.registry.evaluate_all(dataset);
        let mut suggested_metadata = None;

        match &dataset.metadata {
            Some(metadata) if !metadata.fields.is_empty() => {
                for rule in rules_from_metadata(metadata, Provenance::Explicit) {
                    outcomes.push(RuleOutcome::from_rule(rule.as_ref(), dataset));
                }
            }
            _ if mode_config.suggest_metadata => {
                let inferred = infer_metadata(dataset);
                for rule in rules_from_metadata(&inferred, Provenance::Inferred) {
                    outcomes.push(RuleOutcome::from_rule(rule.as_ref(), dataset));
                }
                suggested_metadata = Some(inferred);
            }
            _ => {}
        }
        debug!("Evaluated {} rules in {} mode", outcomes.len(), mode);

        let mut dimension_scores = BTreeMap::new();
        for assessor in DimensionAssessor::all() {
            let mut score = assessor.assess(&outcomes, &mode_config);
            if assessor.dimension() == Dimension::Completeness {
                score = score.with_metric("missing_percentage", dataset.missing_percentage());
            }
            dimension_scores.insert(assessor.dimension(), score);
        }

        let overall_score = dimension_scores
            .values()
            .map(|d| d.score)
            .sum::<f64>()
            .min(OVERALL_MAX_SCORE);
        let passed = overall_score >= self.config.pass_threshold;

        info!(
            "Assessed {}: {:.1}/100 ({})",
            dataset.source.as_deref().unwrap_or("unnamed dataset"),
            overall_score,
            if passed { "passed" } else { "below threshold" }
        );

        AssessmentResult {
            assessment_id: Uuid::new_v4().to_string(),
            overall_score,
            dimension_scores,
            passed,
            standard_id: standard_id.map(str::to_string),
            assessment_mode: mode,
            timestamp: Utc::now(),
            data_info: DataInfo::of(dataset),
            data_source: dataset.source.clone(),
            suggested_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FieldSpec, FieldType, Record};
    use crate::rule::builtin::{NotNullRule, ReferenceRule};
    use serde_json::json;

    fn customers() -> Dataset {
        let rows = (0..30)
            .map(|i| {
                serde_json::from_value::<Record>(json!({
                    "customer_id": i,
                    "segment": (["retail", "b2b"][i % 2]),
                    "spend": 100 + i,
                }))
                .unwrap()
            })
            .collect();
        Dataset::from_records(rows).with_source("customers")
    }

    #[test]
    fn test_discovery_suggests_metadata() {
        let result = ScoreAggregator::default().assess(&customers());
        assert_eq!(result.assessment_mode, AssessmentMode::Discovery);
        let suggested = result.suggested_metadata.as_ref().unwrap();
        assert!(suggested.fields.contains_key("segment"));
        assert_eq!(result.dimension_scores.len(), 5);
        assert_eq!(result.data_source.as_deref(), Some("customers"));
    }

    #[test]
    fn test_overall_is_sum() {
        let result = ScoreAggregator::default().assess(&customers());
        let sum: f64 = result.dimension_scores.values().map(|d| d.score).sum();
        assert!((result.overall_score - sum).abs() < 1e-9);
        assert!(result.overall_score <= 100.0);
    }

    #[test]
    fn test_standard_binding_forces_validation() {
        let result = ScoreAggregator::default().assess_with_standard(&customers(), Some("crm_v1"));
        assert_eq!(result.assessment_mode, AssessmentMode::Validation);
        assert_eq!(result.standard_id.as_deref(), Some("crm_v1"));
        assert!(result.suggested_metadata.is_none());
        // Nothing declared: validation gives no credit.
        assert_eq!(result.overall_score, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_declared_metadata_is_explicit() {
        let mut meta = DatasetMetadata::default();
        meta.fields.insert(
            "spend".to_string(),
            FieldSpec {
                field_type: Some(FieldType::Integer),
                required: true,
                min: Some(0.0),
                ..Default::default()
            },
        );
        let ds = customers().with_metadata(meta);
        let result = ScoreAggregator::new(RuleRegistry::new())
            .with_config(AggregatorConfig {
                mode: AssessmentMode::Validation,
                ..Default::default()
            })
            .assess(&ds);
        let completeness = result.dimension(Dimension::Completeness).unwrap();
        assert_eq!(completeness.component("explicit_communication"), 6.0);
        assert_eq!(completeness.metric("missing_percentage"), Some(0.0));
    }

    #[test]
    fn test_registry_rules_contribute() {
        let registry = RuleRegistry::new()
            .with_rule(NotNullRule::new("id_required", "customer_id"))
            .with_rule(ReferenceRule::new(
                "segment_ref",
                "segment",
                "segments",
                vec![json!("retail"), json!("b2b")],
            ));
        let result = ScoreAggregator::new(registry).assess(&customers());
        let consistency = result.dimension(Dimension::Consistency).unwrap();
        assert!(consistency.rule("segment_ref").unwrap().valid);
        assert_eq!(consistency.component("cross_dataset"), 3.0);
    }

    #[test]
    fn test_pass_threshold() {
        let strict = ScoreAggregator::default().with_config(AggregatorConfig {
            mode: AssessmentMode::Discovery,
            pass_threshold: 101.0,
        });
        assert!(!strict.assess(&customers()).passed);
        let lenient = ScoreAggregator::default().with_config(AggregatorConfig {
            mode: AssessmentMode::Discovery,
            pass_threshold: 0.0,
        });
        assert!(lenient.assess(&customers()).passed);
    }
}
