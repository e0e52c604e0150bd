//! # Audit Records
//!
//! One [`AuditRecord`] is written per guarded call, whether the call
//! proceeded, was redirected or was blocked. Each record serializes to a
//! single JSON object:
//!
//! ```text
//! {
//!   "assessment_metadata": { assessment_id, timestamp, assessment_mode, used_cache, ... },
//!   "assessment_results":  { passed, overall_score, dimension_scores, ... },
//!   "execution_context":   { function_name, module_path, thread },
//!   "performance_metrics": { assessment_duration_ms, rows_per_second }   // optional
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use readiness_assess::{AssessmentMode, AssessmentResult};
use serde::{Deserialize, Serialize};

/// Identity and provenance of the assessment behind a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentMetadata {
    /// Id of the assessment (shared by calls that reused a cached report).
    pub assessment_id: String,
    /// When the assessment ran.
    pub timestamp: DateTime<Utc>,
    /// When this record was written.
    pub recorded_at: DateTime<Utc>,
    /// Concrete mode used.
    pub assessment_mode: AssessmentMode,
    /// Whether the assessment came from the report cache.
    pub used_cache: bool,
    /// Data source name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Bound standard, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_id: Option<String>,
    /// Rows assessed.
    pub row_count: usize,
    /// Columns assessed.
    pub column_count: usize,
}

/// Scores and the guard's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResults {
    /// Whether the guard's thresholds were met.
    pub passed: bool,
    /// Overall score, 0–100.
    pub overall_score: f64,
    /// Score per dimension name.
    pub dimension_scores: BTreeMap<String, f64>,
    /// What the guard did: `proceed`, `warned`, `fallback` or `blocked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Failed threshold checks, human readable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    /// Standard compliance, when a standard was evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<bool>,
}

/// Which call was guarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Name the function was protected under.
    pub function_name: String,
    /// Module path of the protected function.
    pub module_path: String,
    /// Name of the calling thread, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
}

impl ExecutionContext {
    /// Context for a call on the current thread.
    pub fn current(function_name: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            module_path: module_path.into(),
            thread: std::thread::current().name().map(str::to_string),
        }
    }
}

/// Timing of the assessment step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Wall time spent assessing, in milliseconds.
    pub assessment_duration_ms: f64,
    /// Rows assessed per second; 0 when the duration is zero.
    pub rows_per_second: f64,
}

impl PerformanceMetrics {
    /// Metrics for `rows` assessed in `elapsed`.
    pub fn measure(elapsed: Duration, rows: usize) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            assessment_duration_ms: secs * 1000.0,
            rows_per_second: if secs > 0.0 { rows as f64 / secs } else { 0.0 },
        }
    }
}

/// A single line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Identity and provenance.
    pub assessment_metadata: AssessmentMetadata,
    /// Scores and verdict.
    pub assessment_results: AssessmentResults,
    /// The guarded call.
    pub execution_context: ExecutionContext,
    /// Timing, when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<PerformanceMetrics>,
}

impl AuditRecord {
    /// Builds a record from an assessment. `passed` starts as the
    /// assessment's own verdict until [`with_decision`](Self::with_decision).
    pub fn from_assessment(result: &AssessmentResult, context: ExecutionContext) -> Self {
        Self {
            assessment_metadata: AssessmentMetadata {
                assessment_id: result.assessment_id.clone(),
                timestamp: result.timestamp,
                recorded_at: Utc::now(),
                assessment_mode: result.assessment_mode,
                used_cache: false,
                data_source: result.data_source.clone(),
                standard_id: result.standard_id.clone(),
                row_count: result.data_info.row_count,
                column_count: result.data_info.column_count,
            },
            assessment_results: AssessmentResults {
                passed: result.passed,
                overall_score: result.overall_score,
                dimension_scores: result
                    .dimension_scores
                    .iter()
                    .map(|(dim, score)| (dim.to_string(), score.score))
                    .collect(),
                action: None,
                failures: Vec::new(),
                compliant: None,
            },
            execution_context: context,
            performance_metrics: None,
        }
    }

    /// Records the guard's verdict.
    #[must_use]
    pub fn with_decision(mut self, passed: bool, action: impl Into<String>, failures: Vec<String>) -> Self {
        self.assessment_results.passed = passed;
        self.assessment_results.action = Some(action.into());
        self.assessment_results.failures = failures;
        self
    }

    /// Marks the assessment as reused from the cache.
    #[must_use]
    pub fn with_cache(mut self, used_cache: bool) -> Self {
        self.assessment_metadata.used_cache = used_cache;
        self
    }

    /// Records standard compliance.
    #[must_use]
    pub fn with_compliance(mut self, compliant: bool) -> Self {
        self.assessment_results.compliant = Some(compliant);
        self
    }

    /// Attaches timing.
    #[must_use]
    pub fn with_performance(mut self, metrics: PerformanceMetrics) -> Self {
        self.performance_metrics = Some(metrics);
        self
    }
}
