//! # Concurrency Tests
//!
//! Many threads appending to one audit log.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::thread;

use readiness_assess::{Dataset, Record, ScoreAggregator};
use readiness_audit::{export_verodat, read_records, AuditRecord, AuditSink, ExecutionContext, JsonlAuditLog};
use serde_json::json;
use tempfile::TempDir;

fn record(name: String, rows: usize) -> AuditRecord {
    let rows: Vec<Record> = (0..rows)
        .map(|i| serde_json::from_value(json!({"id": i, "label": format!("row {i}")})).unwrap())
        .collect();
    let result = ScoreAggregator::default().assess(&Dataset::from_records(rows));
    AuditRecord::from_assessment(&result, ExecutionContext::current(name, "concurrency"))
}

// ============================================================================
// Interleaving
// ============================================================================

#[test]
fn test_concurrent_appends_produce_whole_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let log: Arc<dyn AuditSink> = Arc::new(JsonlAuditLog::open_at(&path).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..25 {
                    log.append(&record(format!("worker_{t}_{i}"), 50)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    log.close().unwrap();

    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 200);
    let names: HashSet<_> = records
        .iter()
        .map(|r| r.execution_context.function_name.clone())
        .collect();
    assert_eq!(names.len(), 200);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("audit.jsonl");
    let output = dir.path().join("out/verodat.jsonl");
    let log = JsonlAuditLog::open_at(&input).unwrap();
    for i in 0..3 {
        log.append(&record(format!("f{i}"), 5)).unwrap();
    }
    log.close().unwrap();

    assert_eq!(export_verodat(&input, &output).unwrap(), 3);
    let text = fs::read_to_string(&output).unwrap();
    assert_eq!(text.lines().count(), 3);
    for line in text.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["main_record"]["assessment_id"].is_string());
    }
}
