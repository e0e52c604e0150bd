//! Assessment modes.
//!
//! ```text
//!             ┌──────────────┐
//!   dataset ─▶│ resolve_mode │── standard bound / schema-rich ──▶ Validation
//!             └──────────────┘── otherwise ─────────────────────▶ Discovery
//! ```
//!
//! | Mode       | Inferred metadata | Explicit required | Business logic |
//! |------------|-------------------|-------------------|----------------|
//! | Discovery  | allowed           | no                | enabled        |
//! | Validation | ignored           | yes               | disabled       |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::dataset::Dataset;
use crate::error::AssessError;

/// How strictly to treat metadata provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMode {
    /// Exploratory assessment of data without a declared schema.
    Discovery,
    /// Strict assessment against explicitly declared metadata.
    Validation,
    /// Pick one of the above per dataset.
    #[default]
    Auto,
}

impl fmt::Display for AssessmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentMode::Discovery => write!(f, "discovery"),
            AssessmentMode::Validation => write!(f, "validation"),
            AssessmentMode::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for AssessmentMode {
    type Err = AssessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovery" => Ok(AssessmentMode::Discovery),
            "validation" => Ok(AssessmentMode::Validation),
            "auto" => Ok(AssessmentMode::Auto),
            other => Err(AssessError::UnknownMode(other.to_string())),
        }
    }
}

/// Scoring behaviour derived from a concrete mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Concrete mode (never `Auto`).
    pub mode: AssessmentMode,
    /// Inferred rules may earn points.
    pub allow_inferred_metadata: bool,
    /// Only explicit rules earn points.
    pub require_explicit_metadata: bool,
    /// Domain-specific rules count toward cross-dataset credit.
    pub business_logic_enabled: bool,
    /// Inferred metadata is surfaced to the caller.
    pub suggest_metadata: bool,
}

impl ModeConfig {
    /// Configuration for a concrete mode. `Auto` is treated as discovery;
    /// resolve it with [`resolve_mode`] first.
    pub fn for_mode(mode: AssessmentMode) -> Self {
        match mode {
            AssessmentMode::Validation => Self {
                mode,
                allow_inferred_metadata: false,
                require_explicit_metadata: true,
                business_logic_enabled: false,
                suggest_metadata: false,
            },
            AssessmentMode::Discovery | AssessmentMode::Auto => Self {
                mode: AssessmentMode::Discovery,
                allow_inferred_metadata: true,
                require_explicit_metadata: false,
                business_logic_enabled: true,
                suggest_metadata: true,
            },
        }
    }

    /// Whether a rule of the given provenance may earn points.
    pub fn counts(&self, provenance: crate::rule::Provenance) -> bool {
        match provenance {
            crate::rule::Provenance::Explicit => true,
            crate::rule::Provenance::Inferred => {
                self.allow_inferred_metadata && !self.require_explicit_metadata
            }
        }
    }
}

/// Picks a concrete mode for a dataset.
///
/// Validation when a standard is bound (explicitly or via the dataset's
/// metadata) or when constrained field declarations cover a strict
/// majority of columns; discovery otherwise.
pub fn detect_mode(dataset: &Dataset, standard_id: Option<&str>) -> AssessmentMode {
    let metadata = dataset.metadata.as_ref();
    let bound = standard_id.is_some() || metadata.is_some_and(|m| m.standard_id.is_some());
    if bound {
        return AssessmentMode::Validation;
    }
    let constrained = metadata.map_or(0, |m| m.constrained_field_count());
    if dataset.column_count() > 0 && constrained * 2 > dataset.column_count() {
        AssessmentMode::Validation
    } else {
        AssessmentMode::Discovery
    }
}

/// Resolves `Auto` to a concrete mode and logs the choice.
pub fn resolve_mode(
    requested: AssessmentMode,
    dataset: &Dataset,
    standard_id: Option<&str>,
) -> AssessmentMode {
    match requested {
        AssessmentMode::Auto => {
            let mode = detect_mode(dataset, standard_id);
            info!(
                "Auto-detected {} mode for {}",
                mode,
                dataset.source.as_deref().unwrap_or("unnamed dataset")
            );
            mode
        }
        concrete => concrete,
    }
}
