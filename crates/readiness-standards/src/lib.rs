//! # Readiness Standards
//!
//! Named, versioned data standards and the evaluator that measures an
//! assessment against them.
//!
//! ## Overview
//!
//! A standard declares what "ready" means for a class of datasets: an
//! overall minimum, per-dimension minimums, rules that must hold, fields
//! that must be populated and free-form boolean checks. Evaluating an
//! [`AssessmentResult`](readiness_assess::AssessmentResult) against a
//! standard yields a [`TemplateEvaluation`] listing every [`Gap`] with a
//! severity and a ranked remediation plan.
//!
//! ## Severity
//!
//! | Gap (100-point scale) | Severity |
//! |-----------------------|----------|
//! | ≥ 40                  | blocking |
//! | ≥ 20                  | high     |
//! | ≥ 10                  | medium   |
//! | < 10                  | low      |
//!
//! Dimension gaps are scaled ×5 before banding. Missing mandatory fields
//! and unassessed dimensions are always blocking; missing or failing
//! required rules are always high.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐
//! │ YAML document│────▶│  StandardLoader  │── size cap, pattern scan, validate
//! └──────────────┘     └────────┬─────────┘
//!                               ▼
//! ┌──────────────┐     ┌──────────────────┐     ┌────────────────────┐
//! │  Assessment  │────▶│TemplateEvaluator │────▶│ TemplateEvaluation │
//! └──────────────┘     └──────────────────┘     └────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use readiness_standards::{StandardLoader, TemplateEvaluator};
//!
//! let standard = StandardLoader::new()?.load_path("standards/customer_v1.yaml")?;
//! let evaluation = TemplateEvaluator::new().evaluate(&assessment, &standard);
//! for step in &evaluation.remediation_plan {
//!     println!("{}. [{}] {}", step.priority, step.severity, step.action);
//! }
//! ```

pub mod error;
pub mod evaluation;
pub mod evaluator;
pub mod expression;
pub mod gap;
pub mod loader;
pub mod models;
pub mod suggest;

pub use error::{ExpressionError, StandardError};
pub use evaluation::{RemediationEffort, RemediationStep, TemplateEvaluation};
pub use evaluator::TemplateEvaluator;
pub use expression::{Expr, ExpressionContext, MAX_NESTING, MAX_TOKENS};
pub use gap::{Gap, RequirementType, Severity, DIMENSION_GAP_SCALE};
pub use loader::{validate, DocumentScanner, StandardLoader, MAX_DOCUMENT_BYTES};
pub use models::{CustomRule, DimensionRequirement, Requirements, StandardDefinition};
pub use suggest::{suggest_standard, to_yaml};

/// Result type for standard operations.
pub type Result<T> = std::result::Result<T, StandardError>;
