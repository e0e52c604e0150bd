//! # Store Tests
//!
//! Both backends driven through the `ReportStore` trait.

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use readiness_assess::{AssessmentResult, Dataset, Record, ScoreAggregator};
use readiness_cache::{
    cache_key, fingerprint, sanitize_key, source_key, FileReportStore, ReportStore,
    SledReportStore,
};
use serde_json::json;
use tempfile::TempDir;

fn dataset(source: Option<&str>) -> Dataset {
    let rows: Vec<Record> = (0..10)
        .map(|i| serde_json::from_value(json!({"order_id": i, "amount": 10.0 * i as f64})).unwrap())
        .collect();
    let dataset = Dataset::from_records(rows);
    match source {
        Some(s) => dataset.with_source(s),
        None => dataset,
    }
}

fn assess(dataset: &Dataset) -> AssessmentResult {
    ScoreAggregator::default().assess(dataset)
}

fn stores(dir: &TempDir) -> Vec<Arc<dyn ReportStore>> {
    vec![
        Arc::new(FileReportStore::open(dir.path().join("files")).unwrap()),
        Arc::new(SledReportStore::temporary().unwrap()),
    ]
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_cache_key_prefers_source() {
    let key = cache_key(&dataset(Some("orders 2024")));
    assert!(key.starts_with("orders_2024-"));
    assert_eq!(key, source_key("orders 2024"));
    assert_eq!(key.len(), "orders_2024-".len() + 16);
    let anonymous = dataset(None);
    assert_eq!(cache_key(&anonymous), fingerprint(&anonymous));
    assert!(!cache_key(&anonymous).contains('-'));
}

#[test]
fn test_sources_that_sanitize_alike_keep_separate_reports() {
    assert_eq!(sanitize_key("orders/2024"), sanitize_key("orders_2024"));
    assert_ne!(source_key("orders/2024"), source_key("orders_2024"));
    assert_ne!(source_key("a/b"), source_key("a_b"));

    let dir = TempDir::new().unwrap();
    let slashed = dataset(Some("orders/2024"));
    let underscored = dataset(Some("orders_2024"));
    for store in stores(&dir) {
        store.save(&cache_key(&slashed), &assess(&slashed)).unwrap();
        assert!(store.load(&cache_key(&underscored)).unwrap().is_none());
        let loaded = store.load(&cache_key(&slashed)).unwrap().unwrap();
        assert_eq!(loaded.result.data_source.as_deref(), Some("orders/2024"));
    }
}

#[test]
fn test_long_source_names_stay_short() {
    let key = source_key(&"x".repeat(10_000));
    assert!(key.len() <= 64 + 1 + 16);
}

// ============================================================================
// Both backends
// ============================================================================

#[test]
fn test_round_trip_preserves_scores() {
    let dir = TempDir::new().unwrap();
    let data = dataset(Some("orders"));
    let result = assess(&data);
    for store in stores(&dir) {
        store.save(&cache_key(&data), &result).unwrap();
        let loaded = store.load(&cache_key(&data)).unwrap().unwrap();
        assert_eq!(loaded.result.overall_score, result.overall_score);
        assert_eq!(loaded.result.dimension_scores, result.dimension_scores);
        assert_eq!(loaded.result, result);
    }
}

#[test]
fn test_stale_report_detected() {
    let dir = TempDir::new().unwrap();
    let mut result = assess(&dataset(Some("orders")));
    result.timestamp = Utc::now() - Duration::hours(2);
    for store in stores(&dir) {
        store.save("orders", &result).unwrap();
        let loaded = store.load("orders").unwrap().unwrap();
        assert!(!loaded.is_fresh(Utc::now(), Duration::hours(1)));
    }
}

#[test]
fn test_concurrent_saves_last_writer_wins() {
    let dir = TempDir::new().unwrap();
    for store in stores(&dir) {
        let handles: Vec<_> = (0..5)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let result = assess(&dataset(Some(&format!("writer_{i}"))));
                    store.save("shared", &result).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let loaded = store.load("shared").unwrap().unwrap();
        let source = loaded.result.data_source.unwrap();
        assert!(source.starts_with("writer_"));
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn sanitized_keys_are_path_safe(key in ".{0,40}") {
        let safe = sanitize_key(&key);
        prop_assert!(!safe.is_empty());
        prop_assert!(safe.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')));
        prop_assert!(safe != "." && safe != "..");
    }

    #[test]
    fn distinct_sources_get_distinct_keys(a in ".{1,20}", b in ".{1,20}") {
        prop_assume!(a != b);
        prop_assert_ne!(source_key(&a), source_key(&b));
    }
}
