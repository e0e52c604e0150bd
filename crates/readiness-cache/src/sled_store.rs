//! # Embedded-Database Report Store
//!
//! Reports kept in a Sled database instead of loose files. Useful when
//! many data sources are guarded from one process and a directory with
//! thousands of small files becomes unwieldy.
//!
//! ## Storage Structure
//!
//! | Tree      | Key               | Value                       |
//! |-----------|-------------------|-----------------------------|
//! | `reports` | sanitized key     | JSON `CachedReport` envelope |
//!
//! Single-key inserts are atomic in Sled, so a concurrent reader sees
//! either the previous envelope or the new one.

use std::path::Path;

use readiness_assess::AssessmentResult;
use tracing::debug;

use crate::store::{sanitize_key, CachedReport, ReportStore};
use crate::Result;

/// Tree name for stored reports.
const REPORT_TREE: &str = "reports";

/// Report store backed by a Sled tree.
///
/// # Example
///
/// ```rust
/// use readiness_cache::{ReportStore, SledReportStore};
///
/// let store = SledReportStore::temporary().unwrap();
/// assert!(store.load("orders").unwrap().is_none());
/// ```
#[derive(Clone)]
pub struct SledReportStore {
    db: sled::Db,
    reports: sled::Tree,
}

impl SledReportStore {
    /// Opens or creates a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Database` if the path is unusable or the
    /// database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let reports = db.open_tree(REPORT_TREE)?;
        Ok(Self { db, reports })
    }

    /// In-memory database, discarded on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let reports = db.open_tree(REPORT_TREE)?;
        Ok(Self { db, reports })
    }

    /// Number of stored reports.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Flushes pending writes. Returns the number of bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl ReportStore for SledReportStore {
    fn load(&self, key: &str) -> Result<Option<CachedReport>> {
        match self.reports.get(sanitize_key(key).as_bytes())? {
            Some(bytes) => CachedReport::decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, result: &AssessmentResult) -> Result<()> {
        let key = sanitize_key(key);
        let bytes = CachedReport::new(key.clone(), result.clone()).encode()?;
        self.reports.insert(key.as_bytes(), bytes)?;
        debug!("Saved report for '{}' to sled", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.reports.remove(sanitize_key(key).as_bytes())?.is_some())
    }
}

impl std::fmt::Debug for SledReportStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledReportStore")
            .field("reports", &self.len())
            .finish()
    }
}
