//! Error types for standard loading and expression handling.

use thiserror::Error;

/// Errors raised while loading or validating a standard.
///
/// All of these are fatal for the standard in question and are surfaced
/// to the caller unchanged.
#[derive(Debug, Error)]
pub enum StandardError {
    /// The document parsed but its content is unusable.
    #[error("invalid standard: {0}")]
    Configuration(String),

    /// The document was rejected before parsing.
    #[error("standard document rejected: {0}")]
    Security(String),

    /// The document could not be read.
    #[error("failed to read standard: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid YAML for a standard.
    #[error("failed to parse standard: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors raised by the custom-rule expression language.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// The expression text is malformed.
    #[error("syntax error at offset {position}: {message}")]
    Syntax {
        /// Byte offset of the problem.
        position: usize,
        /// What went wrong.
        message: String,
    },

    /// An identifier outside the known vocabulary.
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// A known identifier with no value in the assessment.
    #[error("no value for '{0}' in assessment")]
    MissingValue(String),

    /// Operands of the wrong type.
    #[error("type error: {0}")]
    Type(String),
}

impl From<ExpressionError> for StandardError {
    fn from(e: ExpressionError) -> Self {
        StandardError::Configuration(e.to_string())
    }
}
