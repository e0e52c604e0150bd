//! # Readiness Cache
//!
//! Persistence for assessment reports so a guarded function does not
//! re-assess the same data source on every call.
//!
//! ## Keys
//!
//! A report is stored under the dataset's source name when it has one and
//! under its content [`fingerprint`] otherwise. Keys are sanitized to
//! `[A-Za-z0-9_.-]` before they touch the filesystem or the database.
//!
//! ## Backends
//!
//! | Store              | Layout                   | Atomicity             |
//! |--------------------|--------------------------|-----------------------|
//! | [`FileReportStore`] | `<dir>/<key>.json`      | temp file + rename    |
//! | [`SledReportStore`] | `reports` tree          | single-key insert     |
//!
//! Both write the same versioned [`CachedReport`] envelope. An entry from
//! a different schema version fails with [`CacheError::Incompatible`];
//! an unreadable one with [`CacheError::Corrupt`]. Callers treat both as
//! a cache miss.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use readiness_cache::{cache_key, FileReportStore, ReportStore};
//!
//! let store = FileReportStore::open(".readiness/cache")?;
//! let key = cache_key(&dataset);
//! match store.load(&key)? {
//!     Some(report) if report.is_fresh(Utc::now(), max_age) => reuse(report.result),
//!     _ => store.save(&key, &assess(&dataset))?,
//! }
//! ```

pub mod error;
pub mod file_store;
pub mod fingerprint;
pub mod sled_store;
pub mod store;

pub use error::CacheError;
pub use file_store::FileReportStore;
pub use fingerprint::{canonical_json, fingerprint};
pub use sled_store::SledReportStore;
pub use store::{sanitize_key, CachedReport, ReportStore, SCHEMA_VERSION};

use readiness_assess::Dataset;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Characters of the sanitized source name kept in a source key.
const SOURCE_PREFIX_LEN: usize = 64;

/// Hex digits of the source-name digest kept in a source key.
const SOURCE_DIGEST_LEN: usize = 16;

/// Cache key for a dataset: its source key, else its fingerprint.
pub fn cache_key(dataset: &Dataset) -> String {
    match dataset.source.as_deref() {
        Some(source) if !source.is_empty() => source_key(source),
        _ => fingerprint(dataset),
    }
}

/// Storage key for a named data source.
///
/// A readable prefix (the sanitized name, truncated) followed by `-` and
/// the first hex digits of the SHA-256 of the exact name. Names that
/// sanitize alike, such as `a/b` and `a_b`, get different keys. Source
/// keys always contain `-`, fingerprints never do.
pub fn source_key(source: &str) -> String {
    let prefix: String = sanitize_key(source).chars().take(SOURCE_PREFIX_LEN).collect();
    let digest = fingerprint::hex_sha256(source.as_bytes());
    format!("{prefix}-{}", &digest[..SOURCE_DIGEST_LEN])
}
