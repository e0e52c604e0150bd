//! Verodat-compatible export of audit records.
//!
//! Each record becomes one main row plus one row per dimension:
//!
//! ```text
//! { "main_record": { assessment_id, timestamp, overall_score, passed: "TRUE" | "FALSE" },
//!   "dimension_records": [ { assessment_id, dimension_name, dimension_score }, ... ] }
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::record::AuditRecord;

/// Assessment-level row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerodatMainRecord {
    /// Assessment id.
    pub assessment_id: String,
    /// Assessment time.
    pub timestamp: DateTime<Utc>,
    /// Overall score, 0–100.
    pub overall_score: f64,
    /// `"TRUE"` or `"FALSE"`.
    pub passed: String,
}

/// Dimension-level row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerodatDimensionRecord {
    /// Assessment id.
    pub assessment_id: String,
    /// Dimension name.
    pub dimension_name: String,
    /// Dimension score, 0–20.
    pub dimension_score: f64,
}

/// One audit record in Verodat form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerodatRecord {
    /// Assessment-level row.
    pub main_record: VerodatMainRecord,
    /// One row per dimension.
    pub dimension_records: Vec<VerodatDimensionRecord>,
}

fn flag(value: bool) -> String {
    if value { "TRUE" } else { "FALSE" }.to_string()
}

impl From<&AuditRecord> for VerodatRecord {
    fn from(record: &AuditRecord) -> Self {
        let id = &record.assessment_metadata.assessment_id;
        let results = &record.assessment_results;
        Self {
            main_record: VerodatMainRecord {
                assessment_id: id.clone(),
                timestamp: record.assessment_metadata.timestamp,
                overall_score: results.overall_score,
                passed: flag(results.passed),
            },
            dimension_records: results
                .dimension_scores
                .iter()
                .map(|(name, score)| VerodatDimensionRecord {
                    assessment_id: id.clone(),
                    dimension_name: name.clone(),
                    dimension_score: *score,
                })
                .collect(),
        }
    }
}

/// Reads every record of a JSONL audit log. Blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<AuditRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| AuditError::Malformed {
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Converts a JSONL audit log into a JSONL Verodat file. Returns the
/// number of records exported.
pub fn export_verodat(input: &Path, output: &Path) -> Result<usize> {
    let records = read_records(input)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(output)?);
    for record in &records {
        serde_json::to_writer(&mut writer, &VerodatRecord::from(record))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(records.len())
}
