//! Decision types for guarded calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use readiness_assess::{AssessmentResult, Dimension};

use crate::config::FailurePolicy;

/// A threshold that was not met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ThresholdCheck {
    /// Overall score below the minimum.
    Overall {
        /// Score reached.
        actual: f64,
        /// Score required.
        required: f64,
    },

    /// Dimension score below its minimum.
    Dimension {
        /// Dimension checked.
        dimension: Dimension,
        /// Score reached.
        actual: f64,
        /// Score required.
        required: f64,
    },

    /// A dimension with a minimum was not assessed at all.
    DimensionNotFound {
        /// Dimension requested.
        dimension: Dimension,
    },
}

impl fmt::Display for ThresholdCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overall { actual, required } => {
                write!(f, "overall score {:.1} below required {:.1}", actual, required)
            }
            Self::Dimension {
                dimension,
                actual,
                required,
            } => {
                write!(f, "{} score {:.1} below required {:.1}", dimension, actual, required)
            }
            Self::DimensionNotFound { dimension } => {
                write!(f, "dimension '{}' not found in assessment", dimension)
            }
        }
    }
}

/// Every threshold `result` misses, overall first.
pub fn check_thresholds(
    result: &AssessmentResult,
    min_score: f64,
    dimensions: &BTreeMap<Dimension, f64>,
) -> Vec<ThresholdCheck> {
    let mut failures = Vec::new();
    if result.overall_score < min_score {
        failures.push(ThresholdCheck::Overall {
            actual: result.overall_score,
            required: min_score,
        });
    }
    for (dimension, required) in dimensions {
        match result.dimension_score(*dimension) {
            Some(actual) if actual < *required => failures.push(ThresholdCheck::Dimension {
                dimension: *dimension,
                actual,
                required: *required,
            }),
            Some(_) => {}
            None => failures.push(ThresholdCheck::DimensionNotFound {
                dimension: *dimension,
            }),
        }
    }
    failures
}

/// What the guard did with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardAction {
    /// Thresholds met; the function ran.
    Proceed,
    /// Thresholds missed; the function ran anyway.
    Warned,
    /// Thresholds missed; the fallback ran.
    Fallback,
    /// Thresholds missed; nothing ran.
    Blocked,
}

impl GuardAction {
    /// Action for a check outcome under a policy.
    pub fn resolve(passed: bool, policy: FailurePolicy) -> Self {
        match (passed, policy) {
            (true, _) => Self::Proceed,
            (false, FailurePolicy::Raise) => Self::Blocked,
            (false, FailurePolicy::Warn) => Self::Warned,
            (false, FailurePolicy::Fallback) => Self::Fallback,
        }
    }

    /// Lowercase name, as written to the audit trail.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Warned => "warned",
            Self::Fallback => "fallback",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for GuardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The guard's verdict for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionDecision {
    /// Whether the protected function (or its fallback) ran.
    pub allowed: bool,

    /// Failing checks, joined; `None` when every threshold was met.
    pub reason: Option<String>,

    /// Whether the assessment came from the report cache.
    pub used_cache: bool,

    /// Every failing check.
    pub failures: Vec<ThresholdCheck>,

    /// What was done.
    pub action: GuardAction,
}

impl ProtectionDecision {
    /// Builds a decision from the failing checks and the configured policy.
    pub fn new(failures: Vec<ThresholdCheck>, policy: FailurePolicy, used_cache: bool) -> Self {
        let action = GuardAction::resolve(failures.is_empty(), policy);
        let reason = if failures.is_empty() {
            None
        } else {
            Some(
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        Self {
            allowed: action != GuardAction::Blocked,
            reason,
            used_cache,
            failures,
            action,
        }
    }

    /// Whether every threshold was met.
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}
