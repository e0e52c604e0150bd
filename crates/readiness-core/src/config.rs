//! Configuration types for the readiness guard.
//!
//! Every section has defaults, so a YAML file only needs the keys it
//! changes:
//!
//! ```yaml
//! protection:
//!   min_score: 70
//!   dimensions: { validity: 15 }
//!   on_failure: warn
//! audit:
//!   log_location: ./logs/readiness_audit.jsonl
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use readiness_assess::{AggregatorConfig, AssessmentMode, Dimension, DIMENSION_MAX_SCORE, OVERALL_MAX_SCORE};
use readiness_audit::{AuditSink, JsonlAuditLog, NullAuditSink};
use readiness_cache::{FileReportStore, ReportStore};

use crate::error::ProtectionError;
use crate::Result;

/// Configuration for the readiness guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Threshold and cache settings.
    pub protection: ProtectionConfig,

    /// Scoring settings.
    pub assessment: AssessmentConfig,

    /// Directory for cached reports.
    pub cache_dir: PathBuf,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            audit: AuditConfig::default(),
            protection: ProtectionConfig::default(),
            assessment: AssessmentConfig::default(),
            cache_dir: PathBuf::from("./.readiness/reports"),
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Write audit records at all.
    pub enabled: bool,

    /// JSONL log file.
    pub log_location: PathBuf,

    /// Default log filter for the CLI (`RUST_LOG` overrides it).
    pub log_level: String,

    /// Record assessment duration and throughput.
    pub include_performance_metrics: bool,

    /// Also write Verodat-form records next to the log.
    pub verodat_compatible: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_location: PathBuf::from("./logs/readiness_audit.jsonl"),
            log_level: "info".to_string(),
            include_performance_metrics: true,
            verodat_compatible: false,
        }
    }
}

/// What to do when thresholds are not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return `ProtectionError::ThresholdFailure` without calling the function.
    #[default]
    Raise,
    /// Log a warning and call the function anyway.
    Warn,
    /// Call the fallback handler instead.
    Fallback,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raise => "raise",
            Self::Warn => "warn",
            Self::Fallback => "fallback",
        })
    }
}

impl FromStr for FailurePolicy {
    type Err = ProtectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raise" => Ok(Self::Raise),
            "warn" => Ok(Self::Warn),
            "fallback" => Ok(Self::Fallback),
            other => Err(ProtectionError::Configuration(format!(
                "unknown failure policy '{other}' (expected raise, warn or fallback)"
            ))),
        }
    }
}

/// Threshold and cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Minimum overall score, 0–100.
    pub min_score: f64,

    /// Minimum score per dimension, 0–20.
    pub dimensions: BTreeMap<Dimension, f64>,

    /// Policy when a threshold is missed.
    pub on_failure: FailurePolicy,

    /// Reuse fresh cached reports.
    pub use_cached_reports: bool,

    /// Cached reports older than this are reassessed.
    pub max_report_age_hours: f64,

    /// Persist fresh assessments to the cache.
    pub save_reports: bool,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            min_score: 80.0,
            dimensions: BTreeMap::new(),
            on_failure: FailurePolicy::Raise,
            use_cached_reports: true,
            max_report_age_hours: 24.0,
            save_reports: true,
        }
    }
}

impl ProtectionConfig {
    /// Sets the overall minimum.
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Adds a per-dimension minimum.
    #[must_use]
    pub fn with_dimension(mut self, dimension: Dimension, minimum: f64) -> Self {
        self.dimensions.insert(dimension, minimum);
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Enables or disables cache reuse.
    #[must_use]
    pub fn with_cached_reports(mut self, use_cached_reports: bool) -> Self {
        self.use_cached_reports = use_cached_reports;
        self
    }

    /// Sets the maximum report age.
    #[must_use]
    pub fn with_max_report_age_hours(mut self, hours: f64) -> Self {
        self.max_report_age_hours = hours;
        self
    }

    /// Enables or disables persisting fresh reports.
    #[must_use]
    pub fn with_save_reports(mut self, save_reports: bool) -> Self {
        self.save_reports = save_reports;
        self
    }

    /// Maximum report age as a duration. Ages that are not positive
    /// are zero; unrepresentable ones saturate.
    pub fn max_report_age(&self) -> Duration {
        let millis = self.max_report_age_hours * 3_600_000.0;
        if millis.is_nan() || millis <= 0.0 {
            return Duration::zero();
        }
        Duration::try_milliseconds(millis.min(i64::MAX as f64) as i64).unwrap_or(Duration::MAX)
    }

    /// Checks ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=OVERALL_MAX_SCORE).contains(&self.min_score) {
            return Err(ProtectionError::Configuration(format!(
                "min_score {} outside 0-{OVERALL_MAX_SCORE}",
                self.min_score
            )));
        }
        for (dimension, minimum) in &self.dimensions {
            if !(0.0..=DIMENSION_MAX_SCORE).contains(minimum) {
                return Err(ProtectionError::Configuration(format!(
                    "{dimension} minimum {minimum} outside 0-{DIMENSION_MAX_SCORE}"
                )));
            }
        }
        if self.max_report_age_hours.is_nan() || self.max_report_age_hours <= 0.0 {
            return Err(ProtectionError::Configuration(format!(
                "max_report_age_hours must be positive, got {}",
                self.max_report_age_hours
            )));
        }
        Ok(())
    }
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Assessment mode; `auto` picks per dataset.
    pub mode: AssessmentMode,

    /// Score at which an assessment is marked passed.
    pub pass_threshold: f64,

    /// Standard document to bind, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<PathBuf>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        let aggregator = AggregatorConfig::default();
        Self {
            mode: aggregator.mode,
            pass_threshold: aggregator.pass_threshold,
            standard: None,
        }
    }
}

impl AssessmentConfig {
    /// Settings for the score aggregator.
    pub fn aggregator(&self) -> AggregatorConfig {
        AggregatorConfig {
            mode: self.mode,
            pass_threshold: self.pass_threshold,
        }
    }
}

impl ReadinessConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ProtectionError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ProtectionError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        self.protection.validate()?;
        if !(0.0..=OVERALL_MAX_SCORE).contains(&self.assessment.pass_threshold) {
            return Err(ProtectionError::Configuration(format!(
                "pass_threshold {} outside 0-{OVERALL_MAX_SCORE}",
                self.assessment.pass_threshold
            )));
        }
        if self.audit.enabled && self.audit.log_location.as_os_str().is_empty() {
            return Err(ProtectionError::Configuration(
                "audit.log_location is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens the audit sink this configuration describes.
    pub fn audit_sink(&self) -> Result<Arc<dyn AuditSink>> {
        if !self.audit.enabled {
            return Ok(Arc::new(NullAuditSink));
        }
        let path = &self.audit.log_location;
        let mut log = JsonlAuditLog::new(path);
        if self.audit.verodat_compatible {
            log = log.with_verodat(JsonlAuditLog::sibling_verodat_path(path));
        }
        log.open().map_err(|e| {
            ProtectionError::Configuration(format!("cannot open audit log {}: {e}", path.display()))
        })?;
        Ok(Arc::new(log))
    }

    /// Opens the report store, if reports are read or written at all.
    pub fn report_store(&self) -> Result<Option<Arc<dyn ReportStore>>> {
        if !self.protection.use_cached_reports && !self.protection.save_reports {
            return Ok(None);
        }
        let store = FileReportStore::open(&self.cache_dir).map_err(|e| {
            ProtectionError::Configuration(format!(
                "cannot open report cache {}: {e}",
                self.cache_dir.display()
            ))
        })?;
        Ok(Some(Arc::new(store)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReadinessConfig::default();
        assert!(config.audit.enabled);
        assert_eq!(config.protection.min_score, 80.0);
        assert_eq!(config.protection.on_failure, FailurePolicy::Raise);
        assert_eq!(config.protection.max_report_age_hours, 24.0);
        assert_eq!(config.assessment.mode, AssessmentMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config = ReadinessConfig::from_yaml_str(
            "protection:\n  min_score: 70\n  dimensions:\n    validity: 15\n  on_failure: warn\n",
        )
        .unwrap();
        assert_eq!(config.protection.min_score, 70.0);
        assert_eq!(config.protection.dimensions[&Dimension::Validity], 15.0);
        assert_eq!(config.protection.on_failure, FailurePolicy::Warn);
        assert!(config.protection.save_reports);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(ReadinessConfig::from_yaml_str("protection:\n  min_score: 120\n").is_err());
        assert!(ReadinessConfig::from_yaml_str("protection:\n  dimensions:\n    freshness: 25\n").is_err());
        assert!(ReadinessConfig::from_yaml_str("protection:\n  max_report_age_hours: 0\n").is_err());
        assert!(ReadinessConfig::from_yaml_str("protection:\n  on_failure: explode\n").is_err());
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("Fallback".parse::<FailurePolicy>().unwrap(), FailurePolicy::Fallback);
        assert!("ignore".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_max_report_age() {
        let config = ProtectionConfig::default().with_max_report_age_hours(1.5);
        assert_eq!(config.max_report_age(), Duration::minutes(90));
        for hours in [f64::NAN, f64::NEG_INFINITY, -3.0] {
            let config = ProtectionConfig::default().with_max_report_age_hours(hours);
            assert_eq!(config.max_report_age(), Duration::zero());
        }
        for hours in [f64::INFINITY, 1e300] {
            let config = ProtectionConfig::default().with_max_report_age_hours(hours);
            assert_eq!(config.max_report_age(), Duration::MAX);
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = ReadinessConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = ReadinessConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
