//! Error types for the audit trail.

use thiserror::Error;

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors raised by audit sinks and the export reader.
///
/// The guard never propagates these; a failed append is logged and the
/// protected call continues.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Filesystem failure while opening or appending.
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("failed to serialize audit record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Append on a sink that is not open.
    #[error("audit sink is closed")]
    Closed,

    /// A line of an existing log could not be parsed.
    #[error("malformed audit record on line {line}: {reason}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },
}
