//! # Standard Loader
//!
//! Standard documents come from outside the process, so they are screened
//! before the YAML parser ever sees them:
//!
//! ```text
//!  bytes ──▶ size cap ──▶ pattern scan ──▶ serde_yaml ──▶ validate ──▶ StandardDefinition
//!              │              │                │              │
//!              ▼              ▼                ▼              ▼
//!          Security       Security           Parse       Configuration
//! ```
//!
//! | Pattern                | Why it is refused                         |
//! |------------------------|-------------------------------------------|
//! | language-specific tags | `!!python/object` and friends construct objects |
//! | `!<tag:...>`           | verbatim tags bypass the tag allow-list   |
//! | code-execution calls   | `eval(`, `exec(`, `system(` ...           |
//! | `<script>`             | documents are rendered into reports       |
//! | excessive aliases      | alias expansion bombs                     |

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::StandardError;
use crate::expression::Expr;
use crate::models::StandardDefinition;
use crate::Result;

/// Largest accepted document, in bytes.
pub const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Largest accepted number of alias references.
pub const MAX_ALIASES: usize = 64;

/// Dangerous construct with its description.
struct DangerPattern {
    pattern: Regex,
    description: &'static str,
}

/// Screens raw documents for constructs that must never reach the parser.
pub struct DocumentScanner {
    patterns: Vec<DangerPattern>,
    alias: Regex,
    max_aliases: usize,
}

impl DocumentScanner {
    /// Builds the scanner.
    pub fn new() -> Result<Self> {
        let specs: [(&str, &'static str); 4] = [
            (
                r"!!(python|ruby|java|javascript|js|perl|php)\b",
                "language-specific YAML tag",
            ),
            (r"!<\s*tag:", "verbatim YAML tag"),
            (
                r"(?i)\b(eval|exec|system|popen|subprocess|__import__|os\.system|runtime\.getruntime)\s*\(",
                "code execution call",
            ),
            (r"(?i)<\s*script\b", "script tag"),
        ];
        let mut patterns = Vec::with_capacity(specs.len());
        for (source, description) in specs {
            let pattern = Regex::new(source)
                .map_err(|e| StandardError::Configuration(format!("scanner pattern: {e}")))?;
            patterns.push(DangerPattern {
                pattern,
                description,
            });
        }
        let alias = Regex::new(r"(?m)(?:^|[\s\[\{,:-])\*[A-Za-z0-9_-]+")
            .map_err(|e| StandardError::Configuration(format!("scanner pattern: {e}")))?;
        Ok(Self {
            patterns,
            alias,
            max_aliases: MAX_ALIASES,
        })
    }

    /// Overrides the alias limit.
    #[must_use]
    pub fn with_max_aliases(mut self, max_aliases: usize) -> Self {
        self.max_aliases = max_aliases;
        self
    }

    /// Rejects the document if it contains a dangerous construct.
    pub fn scan(&self, document: &str) -> Result<()> {
        for p in &self.patterns {
            if p.pattern.is_match(document) {
                warn!("Rejected standard document: {}", p.description);
                return Err(StandardError::Security(p.description.to_string()));
            }
        }
        let aliases = self.alias.find_iter(document).count();
        if aliases > self.max_aliases {
            warn!("Rejected standard document: {} aliases", aliases);
            return Err(StandardError::Security(format!(
                "excessive aliases ({aliases} > {})",
                self.max_aliases
            )));
        }
        Ok(())
    }
}

/// Loads and validates standard documents.
pub struct StandardLoader {
    scanner: DocumentScanner,
    max_bytes: usize,
}

impl StandardLoader {
    /// Creates a loader with the default limits.
    pub fn new() -> Result<Self> {
        Ok(Self {
            scanner: DocumentScanner::new()?,
            max_bytes: MAX_DOCUMENT_BYTES,
        })
    }

    /// Overrides the size cap.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Loads a standard from YAML text.
    pub fn load_str(&self, document: &str) -> Result<StandardDefinition> {
        if document.len() > self.max_bytes {
            return Err(StandardError::Security(format!(
                "document is {} bytes (limit {})",
                document.len(),
                self.max_bytes
            )));
        }
        self.scanner.scan(document)?;
        let standard: StandardDefinition = serde_yaml::from_str(document)?;
        validate(&standard)?;
        debug!("Loaded standard {} v{}", standard.id, standard.version);
        Ok(standard)
    }

    /// Loads a standard from a YAML file.
    ///
    /// The size cap is checked against file metadata before reading.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<StandardDefinition> {
        let path = path.as_ref();
        let len = std::fs::metadata(path)?.len();
        if len > self.max_bytes as u64 {
            return Err(StandardError::Security(format!(
                "{} is {} bytes (limit {})",
                path.display(),
                len,
                self.max_bytes
            )));
        }
        let document = std::fs::read_to_string(path)?;
        self.load_str(&document)
    }
}

/// Checks a parsed standard for unusable content.
pub fn validate(standard: &StandardDefinition) -> Result<()> {
    let invalid = |msg: String| Err(StandardError::Configuration(msg));

    if standard.id.trim().is_empty() {
        return invalid("standard id is empty".to_string());
    }
    if standard.version.trim().is_empty() {
        return invalid(format!("standard '{}' has no version", standard.id));
    }

    let req = &standard.requirements;
    if let Some(min) = req.overall_minimum {
        if !(0.0..=100.0).contains(&min) {
            return invalid(format!("overall_minimum {min} outside 0-100"));
        }
    }
    for (dim, dr) in &req.dimension_requirements {
        if let Some(min) = dr.minimum_score {
            if !(0.0..=20.0).contains(&min) {
                return invalid(format!("{dim} minimum_score {min} outside 0-20"));
            }
        }
        if let Some(max) = dr.max_missing_percentage {
            if !(0.0..=100.0).contains(&max) {
                return invalid(format!("{dim} max_missing_percentage {max} outside 0-100"));
            }
        }
        if dr.required_rules.iter().any(|r| r.trim().is_empty()) {
            return invalid(format!("{dim} lists an empty required rule id"));
        }
    }
    if req.mandatory_fields.iter().any(|f| f.trim().is_empty()) {
        return invalid("mandatory_fields contains an empty name".to_string());
    }

    let mut ids = BTreeSet::new();
    for rule in &req.custom_rules {
        if rule.id.trim().is_empty() {
            return invalid("custom rule with empty id".to_string());
        }
        if !ids.insert(rule.id.as_str()) {
            return invalid(format!("duplicate custom rule id '{}'", rule.id));
        }
        Expr::parse(&rule.expression).map_err(|e| {
            StandardError::Configuration(format!("custom rule '{}': {e}", rule.id))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use readiness_assess::Dimension;
    use std::io::Write;

    const VALID: &str = r#"
standards:
  id: customer_v1
  name: Customer master data
  version: 1.2.0
  authority: Data Office
requirements:
  overall_minimum: 80
  dimension_requirements:
    validity:
      minimum_score: 15
      required_rules: [email_format]
    completeness:
      max_missing_percentage: 5
  mandatory_fields: [customer_id, email]
  custom_rules:
    - id: fresh_and_valid
      description: Recent records must also be well-formed
      expression: "freshness >= 10 and validity >= 12"
"#;

    fn loader() -> StandardLoader {
        StandardLoader::new().unwrap()
    }

    #[test]
    fn test_load_valid_document() {
        let std = loader().load_str(VALID).unwrap();
        assert_eq!(std.id, "customer_v1");
        assert_eq!(std.version, "1.2.0");
        assert_eq!(std.authority, "Data Office");
        assert_eq!(std.requirements.mandatory_fields.len(), 2);
        assert_eq!(
            std.requirements.dimension_requirements[&Dimension::Validity].required_rules,
            vec!["email_format".to_string()]
        );
    }

    #[test]
    fn test_oversized_document_rejected() {
        let big = format!("{VALID}\n# {}", "x".repeat(MAX_DOCUMENT_BYTES));
        assert!(matches!(loader().load_str(&big), Err(StandardError::Security(_))));
        let small = loader().with_max_bytes(10);
        assert!(matches!(small.load_str(VALID), Err(StandardError::Security(_))));
    }

    #[test]
    fn test_language_tags_rejected() {
        let doc = "standards: !!python/object:os.system {id: x}\n";
        assert!(matches!(loader().load_str(doc), Err(StandardError::Security(_))));
        let doc = "standards: !<tag:yaml.org,2002:str> x\n";
        assert!(matches!(loader().load_str(doc), Err(StandardError::Security(_))));
    }

    #[test]
    fn test_code_and_script_rejected() {
        let doc = format!("{VALID}\n# eval(open('x').read())\n");
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Security(_))));
        let doc = VALID.replace("Customer master data", "<script>alert(1)</script>");
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Security(_))));
    }

    #[test]
    fn test_alias_bomb_rejected() {
        let mut doc = String::from("a: &a [x]\nb: [");
        for _ in 0..100 {
            doc.push_str("*a, ");
        }
        doc.push_str("*a]\n");
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Security(_))));
    }

    #[test]
    fn test_parse_error() {
        let doc = "standards: [unterminated\n";
        assert!(matches!(loader().load_str(doc), Err(StandardError::Parse(_))));
    }

    #[test]
    fn test_validation_errors() {
        let doc = VALID.replace("overall_minimum: 80", "overall_minimum: 180");
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Configuration(_))));
        let doc = VALID.replace("minimum_score: 15", "minimum_score: 25");
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Configuration(_))));
        let doc = VALID.replace("freshness >= 10", "accuracy >= 10");
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Configuration(_))));
    }

    #[test]
    fn test_deeply_nested_expression_rejected() {
        let depth = 200_000;
        let expression = format!("{}validity > 1{}", "(".repeat(depth), ")".repeat(depth));
        let doc = VALID.replace("freshness >= 10 and validity >= 12", &expression);
        assert!(doc.len() < MAX_DOCUMENT_BYTES);
        assert!(matches!(loader().load_str(&doc), Err(StandardError::Configuration(_))));

        let depth = crate::expression::MAX_NESTING + 1;
        let expression = format!("{}validity > 1{}", "(".repeat(depth), ")".repeat(depth));
        let doc = VALID.replace("freshness >= 10 and validity >= 12", &expression);
        match loader().load_str(&doc) {
            Err(StandardError::Configuration(msg)) => assert!(msg.contains("nesting"), "{msg}"),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let std = loader().load_path(file.path()).unwrap();
        assert_eq!(std.id, "customer_v1");
        assert!(matches!(
            loader().load_path("/definitely/not/here.yaml"),
            Err(StandardError::Io(_))
        ));
    }
}
