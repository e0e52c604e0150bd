//! # Readiness Audit
//!
//! Durable, append-only trail of guarded calls: one JSON object per line,
//! one line per call.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`AuditRecord`] | What was assessed, what was decided, for which call |
//! | [`AuditSink`] | `open` / `append` / `close` lifecycle, shared across threads |
//! | [`JsonlAuditLog`] | Mutex-serialized JSONL file, optional Verodat side file |
//! | [`VerodatRecord`] | Main row + per-dimension rows export form |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use readiness_audit::{AuditSink, JsonlAuditLog};
//!
//! let log = JsonlAuditLog::open_at("logs/readiness_audit.jsonl")?;
//! // hand `Arc::new(log)` to the protection engine ...
//! log.close()?;
//! # Ok::<(), readiness_audit::AuditError>(())
//! ```

mod error;
mod export;
mod record;
mod sink;

pub use error::{AuditError, Result};
pub use export::{export_verodat, read_records, VerodatDimensionRecord, VerodatMainRecord, VerodatRecord};
pub use record::{AssessmentMetadata, AssessmentResults, AuditRecord, ExecutionContext, PerformanceMetrics};
pub use sink::{AuditSink, JsonlAuditLog, MemoryAuditSink, NullAuditSink};
