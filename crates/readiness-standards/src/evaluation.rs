//! Evaluation outcome of an assessment against a standard.
//!
//! A [`TemplateEvaluation`] is built incrementally with
//! [`add_gap`](TemplateEvaluation::add_gap) and
//! [`add_passed_requirement`](TemplateEvaluation::add_passed_requirement),
//! then [`finalize`](TemplateEvaluation::finalize)d. Finalizing derives
//! every summary field from the gaps and counters and may be repeated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gap::{Gap, Severity};

/// Rough size of the work needed to reach compliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationEffort {
    /// Minor adjustments.
    Low,
    /// Some high-severity work.
    Medium,
    /// Several blocking issues.
    High,
}

impl fmt::Display for RemediationEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationEffort::Low => write!(f, "low"),
            RemediationEffort::Medium => write!(f, "medium"),
            RemediationEffort::High => write!(f, "high"),
        }
    }
}

/// One ranked step of the remediation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationStep {
    /// Rank, starting at 1.
    pub priority: usize,
    /// Requirement the step addresses.
    pub requirement_id: String,
    /// Severity of the underlying gap.
    pub severity: Severity,
    /// What to do.
    pub action: String,
    /// Size of the gap on the 100-point scale.
    pub gap_size: f64,
}

/// Assessment × standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateEvaluation {
    /// Standard evaluated against.
    pub standard_id: String,
    /// Version of that standard.
    pub standard_version: String,
    /// Unmet requirements.
    pub gaps: Vec<Gap>,
    /// Ids of satisfied requirements.
    pub passed_requirements: Vec<String>,
    /// Number of unmet requirements.
    pub failed_requirements: usize,
    /// Share of requirements met, 0–100.
    pub compliance_score: f64,
    /// No gaps at all.
    pub compliant: bool,
    /// No blocking gaps.
    pub certification_eligible: bool,
    /// Descriptions of the blocking gaps.
    pub certification_blockers: Vec<String>,
    /// Gaps ranked by severity, then size.
    pub remediation_plan: Vec<RemediationStep>,
    /// Overall effort estimate.
    pub estimated_remediation_effort: RemediationEffort,
}

impl TemplateEvaluation {
    /// Starts an empty evaluation.
    pub fn new(standard_id: impl Into<String>, standard_version: impl Into<String>) -> Self {
        Self {
            standard_id: standard_id.into(),
            standard_version: standard_version.into(),
            gaps: Vec::new(),
            passed_requirements: Vec::new(),
            failed_requirements: 0,
            compliance_score: 100.0,
            compliant: true,
            certification_eligible: true,
            certification_blockers: Vec::new(),
            remediation_plan: Vec::new(),
            estimated_remediation_effort: RemediationEffort::Low,
        }
    }

    /// Records an unmet requirement.
    pub fn add_gap(&mut self, gap: Gap) {
        self.gaps.push(gap);
    }

    /// Records a satisfied requirement.
    pub fn add_passed_requirement(&mut self, requirement_id: impl Into<String>) {
        self.passed_requirements.push(requirement_id.into());
    }

    /// Derives the summary fields. Idempotent.
    pub fn finalize(&mut self) {
        self.failed_requirements = self.gaps.len();
        let passed = self.passed_requirements.len();
        let total = passed + self.failed_requirements;
        self.compliance_score = if total == 0 {
            100.0
        } else {
            passed as f64 / total as f64 * 100.0
        };

        self.compliant = self.gaps.is_empty();
        self.certification_blockers = self
            .gaps
            .iter()
            .filter(|g| g.severity.is_blocking())
            .map(|g| g.description.clone())
            .collect();
        self.certification_eligible = self.certification_blockers.is_empty();

        let mut ranked: Vec<&Gap> = self.gaps.iter().collect();
        ranked.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.gap_size().total_cmp(&a.gap_size()))
        });
        self.remediation_plan = ranked
            .into_iter()
            .enumerate()
            .map(|(i, g)| RemediationStep {
                priority: i + 1,
                requirement_id: g.requirement_id.clone(),
                severity: g.severity,
                action: g.remediation_hint.clone(),
                gap_size: g.gap_size(),
            })
            .collect();

        let blocking = self.certification_blockers.len();
        let high = self.gaps.iter().filter(|g| g.severity == Severity::High).count();
        self.estimated_remediation_effort = if blocking >= 3 {
            RemediationEffort::High
        } else if blocking > 0 || high > 0 {
            RemediationEffort::Medium
        } else {
            RemediationEffort::Low
        };
    }

    /// Gaps at or above `severity`.
    pub fn gaps_at_least(&self, severity: Severity) -> impl Iterator<Item = &Gap> {
        self.gaps.iter().filter(move |g| g.severity >= severity)
    }
}
