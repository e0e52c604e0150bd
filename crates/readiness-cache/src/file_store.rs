//! Directory-backed report store.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a temporary file in
//! the same directory which is then renamed over the target, so readers
//! see either the previous report or the new one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use readiness_assess::AssessmentResult;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::store::{sanitize_key, CachedReport, ReportStore};
use crate::Result;

/// One JSON file per data source.
#[derive(Debug, Clone)]
pub struct FileReportStore {
    dir: PathBuf,
}

impl FileReportStore {
    /// Opens a store in `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the reports.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a key is stored in.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl ReportStore for FileReportStore {
    fn load(&self, key: &str) -> Result<Option<CachedReport>> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        CachedReport::decode(key, &bytes).map(Some)
    }

    fn save(&self, key: &str, result: &AssessmentResult) -> Result<()> {
        let path = self.path_for(key);
        let bytes = CachedReport::new(sanitize_key(key), result.clone()).encode()?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!("Saved report for '{}' to {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use readiness_assess::{Dataset, Record, ScoreAggregator};
    use serde_json::json;
    use tempfile::TempDir;

    fn result() -> AssessmentResult {
        let rows: Vec<Record> =
            serde_json::from_value(json!([{"sku": "A", "qty": 3}, {"sku": "B", "qty": 5}])).unwrap();
        ScoreAggregator::default().assess(&Dataset::from_records(rows).with_source("stock"))
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileReportStore::open(dir.path()).unwrap();
        let result = result();
        store.save("stock", &result).unwrap();

        let loaded = store.load("stock").unwrap().unwrap();
        assert_eq!(loaded.result, result);
        assert_eq!(loaded.source_key, "stock");
        assert!(store.path_for("stock").exists());
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileReportStore::open(dir.path()).unwrap();
        assert!(store.load("nothing").unwrap().is_none());
        assert!(!store.remove("nothing").unwrap());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileReportStore::open(dir.path()).unwrap();
        store.save("stock", &result()).unwrap();
        assert!(store.remove("stock").unwrap());
        assert!(store.load("stock").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = FileReportStore::open(dir.path()).unwrap();
        fs::write(store.path_for("stock"), "{\"schema_version\": 1, \"truncated").unwrap();
        assert!(matches!(store.load("stock"), Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_unsafe_key_stays_in_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileReportStore::open(dir.path()).unwrap();
        store.save("../escape", &result()).unwrap();
        let path = store.path_for("../escape");
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(store.load("../escape").unwrap().is_some());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileReportStore::open(dir.path()).unwrap();
        store.save("a", &result()).unwrap();
        store.save("a", &result()).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }
}
