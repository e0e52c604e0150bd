//! # Standard Definitions
//!
//! A standard is a named, versioned set of requirements a dataset must
//! meet. It is declared in YAML:
//!
//! ```yaml
//! standards:
//!   id: customer_v1
//!   name: Customer master data
//!   version: 1.2.0
//!   authority: Data Office
//! requirements:
//!   overall_minimum: 80
//!   dimension_requirements:
//!     validity:
//!       minimum_score: 15
//!       required_rules: [email_format]
//!     completeness:
//!       minimum_score: 15
//!       max_missing_percentage: 5
//!   mandatory_fields: [customer_id, email]
//!   custom_rules:
//!     - id: fresh_and_valid
//!       description: Recent records must also be well-formed
//!       expression: "freshness >= 10 and validity >= 12"
//!       severity: high
//! ```
//!
//! Definitions are read-only once loaded and are shared behind an `Arc`.

use readiness_assess::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gap::Severity;

/// Requirements for a single dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionRequirement {
    /// Minimum dimension score, 0–20.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_score: Option<f64>,

    /// Rule ids that must be present and valid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_rules: Vec<String>,

    /// Maximum percentage of missing cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_missing_percentage: Option<f64>,
}

/// A boolean expression over assessment scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    /// Identifier, unique within the standard.
    pub id: String,

    /// What the rule checks.
    #[serde(default)]
    pub description: String,

    /// Expression in the custom-rule language; see [`crate::expression`].
    pub expression: String,

    /// Severity of the gap when the expression is false.
    #[serde(default = "default_custom_severity")]
    pub severity: Severity,
}

fn default_custom_severity() -> Severity {
    Severity::High
}

/// Everything a compliant dataset must satisfy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    /// Minimum overall score, 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_minimum: Option<f64>,

    /// Per-dimension requirements.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimension_requirements: BTreeMap<Dimension, DimensionRequirement>,

    /// Columns that must exist and carry at least one value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mandatory_fields: Vec<String>,

    /// Additional boolean checks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_rules: Vec<CustomRule>,
}

impl Requirements {
    /// True if the standard imposes nothing.
    pub fn is_empty(&self) -> bool {
        self.overall_minimum.is_none()
            && self.dimension_requirements.is_empty()
            && self.mandatory_fields.is_empty()
            && self.custom_rules.is_empty()
    }
}

/// Identity block of a standard document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StandardInfo {
    id: String,
    #[serde(default)]
    name: String,
    version: String,
    #[serde(default)]
    authority: String,
}

/// On-disk layout of a standard document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StandardDocument {
    standards: StandardInfo,
    #[serde(default)]
    requirements: Requirements,
}

/// A named, versioned standard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StandardDocument", into = "StandardDocument")]
pub struct StandardDefinition {
    /// Stable identifier.
    pub id: String,
    /// Version string.
    pub version: String,
    /// Human-readable name.
    pub name: String,
    /// Issuing body.
    pub authority: String,
    /// What the standard demands.
    pub requirements: Requirements,
}

impl StandardDefinition {
    /// Creates an empty standard.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: version.into(),
            authority: String::new(),
            requirements: Requirements::default(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the issuing authority.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// Sets the overall minimum.
    #[must_use]
    pub fn with_overall_minimum(mut self, minimum: f64) -> Self {
        self.requirements.overall_minimum = Some(minimum);
        self
    }

    /// Adds or replaces a dimension requirement.
    #[must_use]
    pub fn with_dimension(mut self, dimension: Dimension, requirement: DimensionRequirement) -> Self {
        self.requirements
            .dimension_requirements
            .insert(dimension, requirement);
        self
    }

    /// Adds a mandatory field.
    #[must_use]
    pub fn with_mandatory_field(mut self, field: impl Into<String>) -> Self {
        self.requirements.mandatory_fields.push(field.into());
        self
    }

    /// Adds a custom rule.
    #[must_use]
    pub fn with_custom_rule(mut self, rule: CustomRule) -> Self {
        self.requirements.custom_rules.push(rule);
        self
    }
}

impl From<StandardDocument> for StandardDefinition {
    fn from(doc: StandardDocument) -> Self {
        Self {
            id: doc.standards.id,
            version: doc.standards.version,
            name: doc.standards.name,
            authority: doc.standards.authority,
            requirements: doc.requirements,
        }
    }
}

impl From<StandardDefinition> for StandardDocument {
    fn from(def: StandardDefinition) -> Self {
        Self {
            standards: StandardInfo {
                id: def.id,
                name: def.name,
                version: def.version,
                authority: def.authority,
            },
            requirements: def.requirements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_layout() {
        let yaml = r#"
standards:
  id: s1
  version: "2"
requirements:
  overall_minimum: 70
  dimension_requirements:
    freshness:
      minimum_score: 10
"#;
        let def: StandardDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "s1");
        assert_eq!(def.version, "2");
        assert_eq!(def.requirements.overall_minimum, Some(70.0));
        assert!(def
            .requirements
            .dimension_requirements
            .contains_key(&Dimension::Freshness));
    }

    #[test]
    fn test_custom_rule_default_severity() {
        let rule: CustomRule = serde_yaml::from_str("id: r\nexpression: validity > 1\n").unwrap();
        assert_eq!(rule.severity, Severity::High);
    }

    #[test]
    fn test_builder_serializes_to_document() {
        let def = StandardDefinition::new("s", "1.0").with_overall_minimum(80.0);
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["standards"]["id"], "s");
        assert_eq!(json["requirements"]["overall_minimum"], 80.0);
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let yaml = "standards: {id: s, version: '1'}\nrequirements:\n  dimension_requirements:\n    accuracy: {minimum_score: 1}\n";
        assert!(serde_yaml::from_str::<StandardDefinition>(yaml).is_err());
    }
}
