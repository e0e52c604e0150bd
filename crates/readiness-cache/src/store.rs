//! The report store abstraction and its on-disk envelope.

use chrono::{DateTime, Duration, Utc};
use readiness_assess::AssessmentResult;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::Result;

/// Envelope version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Persistence for assessment reports, keyed by data source.
///
/// Implementations must be safe to share between threads; concurrent
/// saves for the same key resolve as last-writer-wins, and a reader never
/// observes a partially written entry.
pub trait ReportStore: Send + Sync {
    /// Loads the report stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<CachedReport>>;

    /// Stores `result` under `key`, replacing any previous report.
    fn save(&self, key: &str, result: &AssessmentResult) -> Result<()>;

    /// Removes the report under `key`. Returns whether one existed.
    fn remove(&self, key: &str) -> Result<bool>;
}

/// A stored assessment plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedReport {
    /// Envelope version.
    pub schema_version: u32,
    /// Key the report was stored under.
    pub source_key: String,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    /// The assessment itself.
    pub result: AssessmentResult,
}

impl CachedReport {
    /// Wraps an assessment in a current-version envelope.
    pub fn new(key: impl Into<String>, result: AssessmentResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            source_key: key.into(),
            stored_at: Utc::now(),
            result,
        }
    }

    /// Whether the assessment is at most `max_age` old as of `now`.
    ///
    /// Age is measured from the assessment timestamp, not from when the
    /// entry was stored.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.result.age(now) <= max_age
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes an entry, checking the envelope version before the body.
    pub(crate) fn decode(key: &str, bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| corrupt(key, e))?;
        let found = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| CacheError::Corrupt {
                key: key.to_string(),
                reason: "missing schema_version".to_string(),
            })?;
        if found != u64::from(SCHEMA_VERSION) {
            return Err(CacheError::Incompatible {
                key: key.to_string(),
                found: u32::try_from(found).unwrap_or(u32::MAX),
                expected: SCHEMA_VERSION,
            });
        }
        serde_json::from_value(value).map_err(|e| corrupt(key, e))
    }
}

fn corrupt(key: &str, err: serde_json::Error) -> CacheError {
    CacheError::Corrupt {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

/// Maps a data-source name to a safe storage key.
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`; an empty or dot-only
/// result becomes `_` so a key never names the directory itself.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "_".repeat(cleaned.len().max(1))
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readiness_assess::{Dataset, Record, ScoreAggregator};
    use serde_json::json;

    fn report() -> CachedReport {
        let rows: Vec<Record> = serde_json::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
        let result = ScoreAggregator::default().assess(&Dataset::from_records(rows));
        CachedReport::new("ids", result)
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("sales/2024 Q1.csv"), "sales_2024_Q1.csv");
        assert_eq!(sanitize_key("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_key(".."), "__");
        assert_eq!(sanitize_key(""), "_");
        assert_eq!(sanitize_key("orders-v2_final"), "orders-v2_final");
    }

    #[test]
    fn test_decode_round_trip() {
        let report = report();
        let bytes = report.encode().unwrap();
        assert_eq!(CachedReport::decode("ids", &bytes).unwrap(), report);
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let err = CachedReport::decode("ids", b"{not json").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_decode_wrong_version_is_incompatible() {
        let mut value = serde_json::to_value(report()).unwrap();
        value["schema_version"] = json!(7);
        let bytes = serde_json::to_vec(&value).unwrap();
        let err = CachedReport::decode("ids", &bytes).unwrap_err();
        assert!(matches!(err, CacheError::Incompatible { found: 7, expected: 1, .. }));
    }

    #[test]
    fn test_freshness_uses_assessment_time() {
        let mut report = report();
        let now = Utc::now();
        report.result.timestamp = now - Duration::hours(2);
        report.stored_at = now;
        assert!(!report.is_fresh(now, Duration::hours(1)));
        assert!(report.is_fresh(now, Duration::hours(3)));
    }
}
