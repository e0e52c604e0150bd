//! Error types for rule evaluation and scoring.
//!
//! Rule errors never escape an assessment: the aggregator degrades a
//! failing rule to a zero-score outcome. They exist so that rule
//! implementations can report *why* they could not run.

use thiserror::Error;

/// Errors raised by an individual rule while inspecting a dataset.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The column the rule targets does not exist in the dataset.
    #[error("rule '{rule}' targets missing column '{column}'")]
    MissingColumn {
        /// Rule identifier.
        rule: String,
        /// Column that was expected.
        column: String,
    },

    /// A pattern could not be compiled.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// Any other evaluation failure.
    #[error("rule evaluation failed: {0}")]
    Evaluation(String),
}

/// Errors raised when parsing assessment vocabulary.
#[derive(Debug, Error)]
pub enum AssessError {
    /// A dimension name outside the five known dimensions.
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// An assessment mode name that is not discovery, validation or auto.
    #[error("unknown assessment mode: {0}")]
    UnknownMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_display() {
        let err = RuleError::MissingColumn {
            rule: "email_required".to_string(),
            column: "email".to_string(),
        };
        assert!(err.to_string().contains("email_required"));
        assert!(err.to_string().contains("'email'"));
    }

    #[test]
    fn test_unknown_dimension_display() {
        let err = AssessError::UnknownDimension("accuracy".to_string());
        assert_eq!(err.to_string(), "unknown dimension: accuracy");
    }
}
