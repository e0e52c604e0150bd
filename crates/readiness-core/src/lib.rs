//! # Readiness Core
//!
//! Gates function calls on the quality of the data they are given.
//! Assesses the data along five dimensions, checks the scores against
//! configured thresholds and an optional standard, writes an audit record
//! and then runs, warns about, redirects or blocks the call.
//!
//! ## Failure Policies
//!
//! | Policy     | Thresholds missed                                       |
//! |------------|---------------------------------------------------------|
//! | `raise`    | `Err(ThresholdFailure)`, the function never runs        |
//! | `warn`     | `warn!` log, the function runs                          |
//! | `fallback` | the fallback handler runs with `(data, score, evaluation)` |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     READINESS CORE                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                    ┌──────────────────┐                         │
//! │                    │ ProtectionEngine │  ← shared via Arc        │
//! │                    └────────┬─────────┘                         │
//! │      ┌──────────────┬───────┴───────┬───────────────┐           │
//! │      ▼              ▼               ▼               ▼           │
//! │ ┌─────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐      │
//! │ │  Cache  │   │  Assess   │   │ Standards │   │  Audit   │      │
//! │ └─────────┘   └───────────┘   └───────────┘   └──────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use readiness_core::{ProtectionEngine, ReadinessConfig};
//!
//! let config = ReadinessConfig::from_path("readiness.yaml")?;
//! let engine = Arc::new(ProtectionEngine::from_config(&config, RuleRegistry::new())?);
//!
//! let train = engine
//!     .protect("train_model", |data: &Dataset| fit(data))
//!     .with_fallback(|data, score, _| baseline(data, score));
//!
//! match train.call(Some(&dataset)) {
//!     Ok(outcome) => println!("{} (cache: {})", outcome.value, outcome.decision.used_cache),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Notes
//!
//! - Exactly one audit record per call that gets past argument checks,
//!   written before the function or fallback runs
//! - Cache and audit failures are logged and never fail the call
//! - A bound standard is evaluated on cache hits too

mod config;
mod decision;
mod error;
mod guard;

pub use config::{AssessmentConfig, AuditConfig, FailurePolicy, ProtectionConfig, ReadinessConfig};
pub use decision::{check_thresholds, GuardAction, ProtectionDecision, ThresholdCheck};
pub use error::ProtectionError;
pub use guard::{FallbackFn, GuardOutcome, ProtectionEngine, Protected};

// Re-export component types for convenience
pub use readiness_assess::{AssessmentResult, Dataset, Dimension, RuleRegistry};
pub use readiness_audit::{AuditSink, JsonlAuditLog, MemoryAuditSink};
pub use readiness_cache::{FileReportStore, ReportStore, SledReportStore};
pub use readiness_standards::{StandardDefinition, TemplateEvaluation};

/// Result type for guard operations.
pub type Result<T> = std::result::Result<T, ProtectionError>;
