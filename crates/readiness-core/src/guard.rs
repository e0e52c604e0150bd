//! The protection engine and protected callables.
//!
//! [`ProtectionEngine`] holds everything shared between guarded calls:
//! thresholds, the score aggregator, an optional bound standard, the
//! report cache and the audit sink. [`ProtectionEngine::protect`] wraps a
//! function in a [`Protected`] value whose [`call`](Protected::call) runs
//! the pipeline:
//!
//! ```text
//! data? ──▶ cache lookup ──▶ assess (on miss) ──▶ evaluate standard
//!                                                      │
//!              f / fallback / error ◀── record ◀── decide
//! ```
//!
//! The engine is `Send + Sync`; share it through an `Arc` and protect as
//! many functions as needed.

use std::any::type_name;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use readiness_assess::{AssessmentResult, Dataset, RuleRegistry, ScoreAggregator};
use readiness_audit::{AuditRecord, AuditSink, ExecutionContext, NullAuditSink, PerformanceMetrics};
use readiness_cache::{cache_key, ReportStore};
use readiness_standards::{StandardDefinition, StandardLoader, TemplateEvaluation, TemplateEvaluator};
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, ProtectionConfig, ReadinessConfig};
use crate::decision::{check_thresholds, GuardAction, ProtectionDecision};
use crate::error::ProtectionError;
use crate::Result;

/// Name of the data argument in error messages.
const DATA_PARAMETER: &str = "data";

/// Shared state for guarded calls.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Arc::new(
///     ProtectionEngine::new(ProtectionConfig::default().with_min_score(70.0))
///         .with_audit_sink(Arc::new(JsonlAuditLog::open_at("audit.jsonl")?)),
/// );
/// let load = engine.protect("load_orders", |data: &Dataset| data.row_count());
/// let outcome = load.call(Some(&orders))?;
/// ```
pub struct ProtectionEngine {
    config: ProtectionConfig,
    aggregator: ScoreAggregator,
    evaluator: TemplateEvaluator,
    standard: Option<Arc<StandardDefinition>>,
    store: Option<Arc<dyn ReportStore>>,
    sink: Arc<dyn AuditSink>,
    include_performance_metrics: bool,
}

impl ProtectionEngine {
    /// An engine with no rules, no cache and no audit trail.
    pub fn new(config: ProtectionConfig) -> Self {
        Self {
            config,
            aggregator: ScoreAggregator::default(),
            evaluator: TemplateEvaluator::new(),
            standard: None,
            store: None,
            sink: Arc::new(NullAuditSink),
            include_performance_metrics: true,
        }
    }

    /// Builds an engine from a full configuration: opens the audit sink and
    /// report store and loads the configured standard.
    ///
    /// # Errors
    ///
    /// `Configuration` for invalid settings or an unopenable log or cache;
    /// `Standard` when the standard document cannot be loaded.
    pub fn from_config(config: &ReadinessConfig, registry: RuleRegistry) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(config.protection.clone())
            .with_aggregator(ScoreAggregator::new(registry).with_config(config.assessment.aggregator()))
            .with_audit_sink(config.audit_sink()?)
            .with_performance_metrics(config.audit.include_performance_metrics);
        if let Some(store) = config.report_store()? {
            engine = engine.with_store(store);
        }
        if let Some(path) = &config.assessment.standard {
            let standard = StandardLoader::new()?.load_path(path)?;
            info!("Bound standard {} v{}", standard.id, standard.version);
            engine = engine.with_standard(Arc::new(standard));
        }
        Ok(engine)
    }

    /// Uses `aggregator` for fresh assessments.
    #[must_use]
    pub fn with_aggregator(mut self, aggregator: ScoreAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Evaluates every assessment against `standard`.
    #[must_use]
    pub fn with_standard(mut self, standard: Arc<StandardDefinition>) -> Self {
        self.standard = Some(standard);
        self
    }

    /// Reads and writes reports through `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Writes one record per call to `sink`.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Whether audit records carry timing.
    #[must_use]
    pub fn with_performance_metrics(mut self, include: bool) -> Self {
        self.include_performance_metrics = include;
        self
    }

    /// Threshold settings.
    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Bound standard, if any.
    pub fn standard(&self) -> Option<&StandardDefinition> {
        self.standard.as_deref()
    }

    /// The audit sink.
    pub fn audit_sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Wraps `f` so that every call is assessed, decided and audited.
    ///
    /// The module path recorded in the audit trail defaults to the module
    /// `f` is defined in. A closure inside a method records the method's
    /// type path and a fn pointer its type name; override either with
    /// [`Protected::with_module_path`].
    pub fn protect<F, T>(self: &Arc<Self>, name: impl Into<String>, f: F) -> Protected<F, T>
    where
        F: Fn(&Dataset) -> T,
    {
        Protected {
            engine: Arc::clone(self),
            name: name.into(),
            module_path: module_of::<F>(),
            f,
            fallback: None,
        }
    }

    /// Cached report for `data` under `key`, if fresh and about the same
    /// data source. Every problem is a miss.
    fn lookup(&self, key: &str, data: &Dataset) -> Option<AssessmentResult> {
        if !self.config.use_cached_reports {
            return None;
        }
        let store = self.store.as_ref()?;
        match store.load(key) {
            Ok(Some(report)) if report.result.data_source != data.source => {
                warn!(
                    "Cached report under '{}' belongs to {:?}, not {:?}",
                    key, report.result.data_source, data.source
                );
                None
            }
            Ok(Some(report)) if report.is_fresh(Utc::now(), self.config.max_report_age()) => {
                debug!("Cache hit for '{}'", key);
                Some(report.result)
            }
            Ok(Some(_)) => {
                debug!("Cached report for '{}' is stale", key);
                None
            }
            Ok(None) => {
                debug!("No cached report for '{}'", key);
                None
            }
            Err(e) => {
                warn!("Ignoring unusable cached report for '{}': {}", key, e);
                None
            }
        }
    }

    fn assess(&self, key: &str, data: &Dataset) -> AssessmentResult {
        let standard_id = self.standard.as_ref().map(|s| s.id.as_str());
        let result = self.aggregator.assess_with_standard(data, standard_id);
        debug!(
            "Assessed '{}': overall {:.1} in {} mode",
            key, result.overall_score, result.assessment_mode
        );
        if self.config.save_reports {
            if let Some(store) = &self.store {
                if let Err(e) = store.save(key, &result) {
                    warn!("Failed to save report for '{}': {}", key, e);
                }
            }
        }
        result
    }

    fn record(&self, record: &AuditRecord) {
        if let Err(e) = self.sink.append(record) {
            warn!(
                "Failed to write audit record for '{}': {}",
                record.execution_context.function_name, e
            );
        }
    }
}

impl std::fmt::Debug for ProtectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionEngine")
            .field("config", &self.config)
            .field("standard", &self.standard.as_ref().map(|s| &s.id))
            .field("cache", &self.store.is_some())
            .finish()
    }
}

/// Module path a callable was defined in, from its type name.
///
/// Fn items lose their own name and closures the function they sit in.
/// A closure inside a method yields the path of the method's type. Types
/// that are not paths (fn pointers, trait objects) come back unchanged.
fn module_of<F>() -> String {
    let mut path = type_name::<F>();
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    // generic arguments may contain `::` themselves
    let item = path.split('<').next().unwrap_or(path);
    let is_path = item
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
    match item.rsplit_once("::") {
        Some((module, _)) if is_path && !module.is_empty() => module.to_string(),
        _ => path.to_string(),
    }
}

/// Handler run instead of the protected function under the `fallback`
/// policy. Receives the data, the overall score and the standard
/// evaluation, if a standard is bound.
pub type FallbackFn<T> = dyn Fn(&Dataset, f64, Option<&TemplateEvaluation>) -> T + Send + Sync;

/// What a successful call produced.
#[derive(Debug, Clone)]
pub struct GuardOutcome<T> {
    /// Return value of the function or of the fallback.
    pub value: T,
    /// The guard's verdict.
    pub decision: ProtectionDecision,
    /// The assessment the verdict was based on.
    pub assessment: AssessmentResult,
    /// Standard evaluation, if a standard is bound.
    pub evaluation: Option<TemplateEvaluation>,
}

/// A function wrapped by a [`ProtectionEngine`].
pub struct Protected<F, T> {
    engine: Arc<ProtectionEngine>,
    name: String,
    module_path: String,
    f: F,
    fallback: Option<Box<FallbackFn<T>>>,
}

impl<F, T> Protected<F, T>
where
    F: Fn(&Dataset) -> T,
{
    /// Sets the handler for the `fallback` policy.
    #[must_use]
    pub fn with_fallback<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Dataset, f64, Option<&TemplateEvaluation>) -> T + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Overrides the module path recorded in the audit trail.
    #[must_use]
    pub fn with_module_path(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = module_path.into();
        self
    }

    /// Name the function is protected under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module path recorded in the audit trail.
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Runs the guarded pipeline for one call.
    ///
    /// # Errors
    ///
    /// - `MissingParameter` when `data` is `None`, before any work.
    /// - `Configuration` under `fallback` without a handler, before any work.
    /// - `ThresholdFailure` under `raise` when a threshold is missed; the
    ///   function is not called.
    pub fn call(&self, data: Option<&Dataset>) -> Result<GuardOutcome<T>> {
        let engine = &self.engine;
        let data = data.ok_or_else(|| ProtectionError::MissingParameter {
            function: self.name.clone(),
            parameter: DATA_PARAMETER.to_string(),
        })?;
        if engine.config.on_failure == FailurePolicy::Fallback && self.fallback.is_none() {
            return Err(ProtectionError::Configuration(format!(
                "'{}' uses the fallback policy but has no fallback handler",
                self.name
            )));
        }

        // Phase 1-2: cached or fresh assessment
        let started = Instant::now();
        let key = cache_key(data);
        let (assessment, used_cache) = match engine.lookup(&key, data) {
            Some(result) => (result, true),
            None => (engine.assess(&key, data), false),
        };
        let elapsed = started.elapsed();
        let evaluation = engine
            .standard
            .as_deref()
            .map(|standard| engine.evaluator.evaluate(&assessment, standard));

        // Phase 3: thresholds
        let failures = check_thresholds(&assessment, engine.config.min_score, &engine.config.dimensions);
        let decision = ProtectionDecision::new(failures, engine.config.on_failure, used_cache);

        // Phase 4: audit, before anything runs
        let mut record = AuditRecord::from_assessment(
            &assessment,
            ExecutionContext::current(&self.name, &self.module_path),
        )
        .with_decision(
            decision.passed(),
            decision.action.as_str(),
            decision.failures.iter().map(ToString::to_string).collect(),
        )
        .with_cache(used_cache);
        if let Some(evaluation) = &evaluation {
            record = record.with_compliance(evaluation.compliant);
        }
        if engine.include_performance_metrics {
            record = record.with_performance(PerformanceMetrics::measure(
                elapsed,
                assessment.data_info.row_count,
            ));
        }
        engine.record(&record);

        // Phase 5: resolve
        let value = match decision.action {
            GuardAction::Proceed => {
                info!(
                    "'{}' allowed: overall {:.1} (cache: {})",
                    self.name, assessment.overall_score, used_cache
                );
                (self.f)(data)
            }
            GuardAction::Warned => {
                warn!(
                    "'{}' running despite failed readiness checks: {}",
                    self.name,
                    decision.reason.as_deref().unwrap_or_default()
                );
                (self.f)(data)
            }
            GuardAction::Fallback => {
                warn!(
                    "'{}' redirected to fallback: {}",
                    self.name,
                    decision.reason.as_deref().unwrap_or_default()
                );
                let handler = self.fallback.as_ref().ok_or_else(|| {
                    ProtectionError::Configuration(format!("'{}' has no fallback handler", self.name))
                })?;
                handler(data, assessment.overall_score, evaluation.as_ref())
            }
            GuardAction::Blocked => {
                warn!(
                    "'{}' blocked: {}",
                    self.name,
                    decision.reason.as_deref().unwrap_or_default()
                );
                return Err(ProtectionError::ThresholdFailure {
                    function: self.name.clone(),
                    checks: decision.failures,
                });
            }
        };

        Ok(GuardOutcome {
            value,
            decision,
            assessment,
            evaluation,
        })
    }
}

impl<F, T> std::fmt::Debug for Protected<F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protected")
            .field("name", &self.name)
            .field("module_path", &self.module_path)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readiness_assess::Record;
    use readiness_audit::MemoryAuditSink;
    use serde_json::json;

    fn dataset() -> Dataset {
        let rows: Vec<Record> = (0..5)
            .map(|i| serde_json::from_value(json!({"id": i})).unwrap())
            .collect();
        Dataset::from_records(rows).with_source("ids")
    }

    fn load_rows(data: &Dataset) -> usize {
        data.row_count()
    }

    fn first_column<T: From<String>>(data: &Dataset) -> Option<T> {
        data.columns.first().cloned().map(T::from)
    }

    #[test]
    fn test_module_path_from_fn_item() {
        let engine = Arc::new(ProtectionEngine::new(ProtectionConfig::default()));
        let protected = engine.protect("load_rows", load_rows);
        assert_eq!(protected.module_path(), "readiness_core::guard::tests");
        let closure = engine.protect("closure", |d: &Dataset| d.column_count());
        assert_eq!(closure.module_path(), "readiness_core::guard::tests");
        let generic = engine.protect("generic", first_column::<String>);
        assert_eq!(generic.module_path(), "readiness_core::guard::tests");
        let pointer: fn(&Dataset) -> usize = load_rows;
        let pointer = engine.protect("pointer", pointer);
        assert!(pointer.module_path().contains("fn("));
    }

    #[test]
    fn test_missing_data_does_nothing() {
        let sink = Arc::new(MemoryAuditSink::new());
        let engine = Arc::new(
            ProtectionEngine::new(ProtectionConfig::default().with_min_score(0.0))
                .with_audit_sink(sink.clone()),
        );
        let err = engine.protect("load", load_rows).call(None).unwrap_err();
        assert!(matches!(err, ProtectionError::MissingParameter { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_fallback_without_handler_is_configuration_error() {
        let sink = Arc::new(MemoryAuditSink::new());
        let engine = Arc::new(
            ProtectionEngine::new(
                ProtectionConfig::default().with_on_failure(FailurePolicy::Fallback),
            )
            .with_audit_sink(sink.clone()),
        );
        let err = engine.protect("load", load_rows).call(Some(&dataset())).unwrap_err();
        assert!(matches!(err, ProtectionError::Configuration(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_pass_runs_function_and_records() {
        let sink = Arc::new(MemoryAuditSink::new());
        let engine = Arc::new(
            ProtectionEngine::new(ProtectionConfig::default().with_min_score(0.0))
                .with_audit_sink(sink.clone()),
        );
        let outcome = engine.protect("load", load_rows).call(Some(&dataset())).unwrap();
        assert_eq!(outcome.value, 5);
        assert!(outcome.decision.allowed);
        assert!(!outcome.decision.used_cache);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].assessment_results.action.as_deref(), Some("proceed"));
        assert!(records[0].performance_metrics.is_some());
    }
}
