//! # Audit Sinks
//!
//! Where audit records go. The guard holds an `Arc<dyn AuditSink>` and
//! calls it from whichever thread the protected call runs on.
//!
//! ## Concurrency
//!
//! [`JsonlAuditLog`] serializes "encode + write line + flush" behind one
//! mutex, so each record lands as a complete line even with many
//! concurrent appenders. When Verodat output is enabled the second file
//! is written under the same lock.
//!
//! | Sink                | Use                                   |
//! |---------------------|---------------------------------------|
//! | [`JsonlAuditLog`]   | production, append-only JSONL file    |
//! | [`MemoryAuditSink`] | tests and embedding                   |
//! | [`NullAuditSink`]   | auditing disabled                     |

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{AuditError, Result};
use crate::export::VerodatRecord;
use crate::record::AuditRecord;

/// Destination for audit records.
///
/// `append` before `open` or after `close` fails with
/// [`AuditError::Closed`].
pub trait AuditSink: Send + Sync {
    /// Prepares the sink. Opening an open sink is a no-op.
    fn open(&self) -> Result<()>;

    /// Writes one record.
    fn append(&self, record: &AuditRecord) -> Result<()>;

    /// Flushes and releases resources. Closing a closed sink is a no-op.
    fn close(&self) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-append leaves at most one truncated line; keep logging.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn write_line<T: serde::Serialize>(file: &mut File, value: &T) -> Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
}

struct Writers {
    log: File,
    verodat: Option<File>,
}

/// Append-only JSON Lines audit file.
pub struct JsonlAuditLog {
    path: PathBuf,
    verodat_path: Option<PathBuf>,
    writers: Mutex<Option<Writers>>,
}

impl JsonlAuditLog {
    /// A log at `path`. Nothing is opened until [`AuditSink::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            verodat_path: None,
            writers: Mutex::new(None),
        }
    }

    /// Creates and opens a log in one step.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let log = Self::new(path);
        log.open()?;
        Ok(log)
    }

    /// Also writes each record in Verodat form to `path`.
    #[must_use]
    pub fn with_verodat(mut self, path: impl Into<PathBuf>) -> Self {
        self.verodat_path = Some(path.into());
        self
    }

    /// Path of the JSONL log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the Verodat file, if enabled.
    pub fn verodat_path(&self) -> Option<&Path> {
        self.verodat_path.as_deref()
    }

    /// Default Verodat file next to a log: `audit.jsonl` → `audit.verodat.jsonl`.
    pub fn sibling_verodat_path(path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audit".to_string());
        path.with_file_name(format!("{stem}.verodat.jsonl"))
    }
}

impl AuditSink for JsonlAuditLog {
    fn open(&self) -> Result<()> {
        let mut writers = lock(&self.writers);
        if writers.is_some() {
            return Ok(());
        }
        let log = open_append(&self.path)?;
        let verodat = self.verodat_path.as_deref().map(open_append).transpose()?;
        *writers = Some(Writers { log, verodat });
        debug!("Opened audit log {}", self.path.display());
        Ok(())
    }

    fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut guard = lock(&self.writers);
        let writers = guard.as_mut().ok_or(AuditError::Closed)?;
        write_line(&mut writers.log, record)?;
        if let Some(verodat) = writers.verodat.as_mut() {
            write_line(verodat, &VerodatRecord::from(record))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if let Some(writers) = lock(&self.writers).take() {
            writers.log.sync_all()?;
            if let Some(verodat) = writers.verodat {
                verodat.sync_all()?;
            }
            debug!("Closed audit log {}", self.path.display());
        }
        Ok(())
    }
}

impl std::fmt::Debug for JsonlAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlAuditLog")
            .field("path", &self.path)
            .field("verodat_path", &self.verodat_path)
            .field("open", &lock(&self.writers).is_some())
            .finish()
    }
}

/// Keeps records in memory. Open from construction.
#[derive(Debug)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    closed: Mutex<bool>,
}

impl MemoryAuditSink {
    /// An empty, open sink.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        }
    }

    /// Copies of everything appended so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        lock(&self.records).clone()
    }

    /// Number of records appended.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// True if nothing was appended.
    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn open(&self) -> Result<()> {
        *lock(&self.closed) = false;
        Ok(())
    }

    fn append(&self, record: &AuditRecord) -> Result<()> {
        if *lock(&self.closed) {
            return Err(AuditError::Closed);
        }
        lock(&self.records).push(record.clone());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        *lock(&self.closed) = true;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn append(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExecutionContext;
    use readiness_assess::{Dataset, Record, ScoreAggregator};
    use serde_json::json;
    use tempfile::TempDir;

    fn record(name: &str) -> AuditRecord {
        let rows: Vec<Record> = serde_json::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
        let result = ScoreAggregator::default().assess(&Dataset::from_records(rows));
        AuditRecord::from_assessment(&result, ExecutionContext::current(name, "tests"))
    }

    #[test]
    fn test_append_requires_open() {
        let dir = TempDir::new().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("audit.jsonl"));
        assert!(matches!(log.append(&record("f")), Err(AuditError::Closed)));
        log.open().unwrap();
        log.append(&record("f")).unwrap();
        log.close().unwrap();
        assert!(matches!(log.append(&record("f")), Err(AuditError::Closed)));
    }

    #[test]
    fn test_lines_are_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/audit.jsonl");
        let log = JsonlAuditLog::open_at(&path).unwrap();
        log.append(&record("first")).unwrap();
        log.append(&record("second")).unwrap();
        log.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let names: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<AuditRecord>(l).unwrap().execution_context.function_name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        for _ in 0..2 {
            let log = JsonlAuditLog::open_at(&path).unwrap();
            log.append(&record("f")).unwrap();
            log.close().unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_verodat_side_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let verodat = JsonlAuditLog::sibling_verodat_path(&path);
        assert_eq!(verodat, dir.path().join("audit.verodat.jsonl"));

        let log = JsonlAuditLog::new(&path).with_verodat(&verodat);
        log.open().unwrap();
        log.append(&record("f")).unwrap();
        log.close().unwrap();

        let line = fs::read_to_string(&verodat).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert!(value["main_record"]["passed"] == "TRUE" || value["main_record"]["passed"] == "FALSE");
        assert_eq!(value["dimension_records"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());
        sink.append(&record("a")).unwrap();
        sink.close().unwrap();
        assert!(sink.append(&record("b")).is_err());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].execution_context.function_name, "a");
    }
}
