//! # Readiness Assessment
//!
//! Five-dimension data-quality scoring for tabular datasets.
//!
//! ## Overview
//!
//! A dataset is inspected by pluggable [`Rule`]s. Each rule contributes to
//! one of five orthogonal dimensions; a [`DimensionAssessor`] condenses the
//! outcomes of a dimension into a score out of 20, and the
//! [`ScoreAggregator`] sums the five into an overall score out of 100.
//!
//! ## Dimensions
//!
//! | Dimension      | Question                                      |
//! |----------------|-----------------------------------------------|
//! | Validity       | Do values have the declared types and formats? |
//! | Completeness   | Are required values present?                  |
//! | Consistency    | Do values agree with each other and with reference data? |
//! | Freshness      | Are time-bound values recent enough?          |
//! | Plausibility   | Are values believable?                        |
//!
//! ## Provenance
//!
//! A dimension score rewards rules that the data owner declared
//! explicitly. Rules inferred from the data itself (discovery mode) earn
//! partial credit; in validation mode they earn none.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ RuleRegistry │   │  declared    │   │  inferred    │
//!  │  (caller)    │   │  metadata    │   │  metadata    │
//!  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!         └──────────────────┼──────────────────┘
//!                            ▼
//!                    ┌───────────────┐
//!                    │ RuleOutcome×N │
//!                    └───────┬───────┘
//!                            ▼
//!                 ┌─────────────────────┐
//!                 │ DimensionAssessor×5 │
//!                 └──────────┬──────────┘
//!                            ▼
//!                    ┌───────────────┐
//!                    │AssessmentResult│
//!                    └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use readiness_assess::{Dataset, RuleRegistry, ScoreAggregator};
//! use readiness_assess::rule::builtin::NotNullRule;
//!
//! let registry = RuleRegistry::new().with_rule(NotNullRule::new("email_required", "email"));
//! let result = ScoreAggregator::new(registry).assess(&dataset);
//! println!("{:.1}/100", result.overall_score);
//! ```

pub mod aggregator;
pub mod assessor;
pub mod dataset;
pub mod dimension;
pub mod error;
pub mod inference;
pub mod mode;
pub mod rule;

pub use aggregator::{AggregatorConfig, AssessmentResult, DataInfo, ScoreAggregator, DEFAULT_PASS_THRESHOLD};
pub use assessor::DimensionAssessor;
pub use dataset::{Dataset, DatasetMetadata, FieldSpec, FieldType, Record};
pub use dimension::{Dimension, DimensionScore, RuleSummary, DIMENSION_MAX_SCORE, OVERALL_MAX_SCORE};
pub use error::{AssessError, RuleError};
pub use inference::{infer_metadata, rules_from_metadata};
pub use mode::{detect_mode, resolve_mode, AssessmentMode, ModeConfig};
pub use rule::{Provenance, Rule, RuleCategory, RuleOutcome, RuleRegistry, RuleResult};

/// Result type for rule evaluation.
pub type Result<T> = std::result::Result<T, RuleError>;
