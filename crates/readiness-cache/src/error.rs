//! Error types for the report cache.
//!
//! None of these are fatal to a guarded call: the guard treats every
//! cache error as a miss and logs it.

use thiserror::Error;

/// Errors raised by a [`ReportStore`](crate::ReportStore).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entry could not be decoded.
    #[error("corrupt cache entry '{key}': {reason}")]
    Corrupt {
        /// Cache key.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// A stored entry was written by an incompatible version.
    #[error("cache entry '{key}' has schema version {found}, expected {expected}")]
    Incompatible {
        /// Cache key.
        key: String,
        /// Version found on disk.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// Embedded database failure.
    #[error("cache database error: {0}")]
    Database(#[from] sled::Error),

    /// An assessment could not be encoded.
    #[error("failed to encode report: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_display() {
        let err = CacheError::Incompatible {
            key: "orders".to_string(),
            found: 0,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "cache entry 'orders' has schema version 0, expected 1"
        );
    }
}
