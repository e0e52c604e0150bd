//! Error types for the readiness guard.

use thiserror::Error;

use crate::decision::ThresholdCheck;

/// The only errors a protected call can return.
///
/// Cache and audit problems never surface here; they are logged and the
/// call continues.
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// The protected function was called without its data argument.
    #[error("protected function '{function}' called without the '{parameter}' argument")]
    MissingParameter {
        /// Protected function name.
        function: String,
        /// Name of the missing argument.
        parameter: String,
    },

    /// Thresholds not met under the `raise` policy.
    #[error("data readiness check failed for '{function}': {}", join(.checks))]
    ThresholdFailure {
        /// Protected function name.
        function: String,
        /// Every failing check, actual vs required.
        checks: Vec<ThresholdCheck>,
    },

    /// Invalid guard configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A standard could not be loaded.
    #[error("standard error: {0}")]
    Standard(#[from] readiness_standards::StandardError),
}

fn join(checks: &[ThresholdCheck]) -> String {
    checks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
