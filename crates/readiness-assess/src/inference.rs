//! Metadata inference and rule derivation.
//!
//! Discovery mode has no declared schema to check against, so the engine
//! derives one from the data itself. Inferred metadata is returned to the
//! caller as a suggestion and turned into rules marked
//! [`Provenance::Inferred`].

use chrono::TimeDelta;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dataset::{Dataset, DatasetMetadata, FieldSpec, FieldType};
use crate::rule::builtin::{
    distinct_values, AllowedValuesRule, NotNullRule, PatternRule, RangeRule, RecencyRule,
    TypeRule, UniquenessRule,
};
use crate::rule::{Provenance, Rule};

/// String columns with at most this many distinct values are treated as
/// enumerations...
const MAX_ENUM_VALUES: usize = 10;

/// ...provided at least this many values were observed.
const MIN_ENUM_SAMPLE: usize = 20;

fn infer_type(values: &[&Value]) -> Option<FieldType> {
    if values.is_empty() {
        return None;
    }
    let all = |t: FieldType| values.iter().all(|v| t.matches(v));
    [
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::Number,
        FieldType::Date,
        FieldType::String,
    ]
    .into_iter()
    .find(|t| all(*t))
}

fn looks_like_identifier(column: &str) -> bool {
    let lower = column.to_ascii_lowercase();
    lower == "id" || lower.ends_with("_id") || lower.ends_with("uuid")
}

/// Infers field declarations from the observed data.
///
/// | Observation | Inferred |
/// |-------------|----------|
/// | every non-null value shares a type | `type` |
/// | no missing values | `required` |
/// | numeric column | `min` / `max` |
/// | few distinct strings, enough samples | `allowed_values` |
/// | identifier-like name, all distinct | `unique` |
pub fn infer_metadata(dataset: &Dataset) -> DatasetMetadata {
    let mut metadata = DatasetMetadata::default();

    for column in &dataset.columns {
        let values: Vec<&Value> = dataset.values(column).collect();
        let mut spec = FieldSpec {
            field_type: infer_type(&values),
            required: !values.is_empty() && values.len() == dataset.row_count(),
            ..Default::default()
        };

        if matches!(spec.field_type, Some(FieldType::Integer | FieldType::Number)) {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            spec.min = numbers.iter().copied().reduce(f64::min);
            spec.max = numbers.iter().copied().reduce(f64::max);
        }

        let distinct = distinct_values(values.iter().copied());
        if spec.field_type == Some(FieldType::String)
            && values.len() >= MIN_ENUM_SAMPLE
            && distinct.len() <= MAX_ENUM_VALUES
        {
            let mut allowed: Vec<Value> = distinct.into_values().collect();
            allowed.sort_by_key(|v| v.to_string());
            spec.allowed_values = Some(allowed);
        } else if looks_like_identifier(column)
            && !values.is_empty()
            && distinct.len() == values.len()
        {
            spec.unique = true;
        }

        debug!("Inferred {:?} for column '{}'", spec, column);
        metadata.fields.insert(column.clone(), spec);
    }

    metadata
}

/// A declared age in days as a duration. Negative, non-finite and
/// unrepresentable ages yield `None`.
fn max_age(days: f64) -> Option<TimeDelta> {
    let seconds = days * 86_400.0;
    if !seconds.is_finite() || seconds < 0.0 || seconds >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_seconds(seconds as i64)
}

/// Turns field declarations into rules.
///
/// Rule ids are `{column}_{kind}`, e.g. `email_required`. A pattern that
/// does not compile is skipped with a warning.
pub fn rules_from_metadata(metadata: &DatasetMetadata, provenance: Provenance) -> Vec<Arc<dyn Rule>> {
    let mut rules: Vec<Arc<dyn Rule>> = Vec::new();
    let inferred = provenance == Provenance::Inferred;

    macro_rules! push {
        ($rule:expr) => {{
            let rule = $rule;
            if inferred {
                rules.push(Arc::new(rule.inferred()));
            } else {
                rules.push(Arc::new(rule));
            }
        }};
    }

    for (column, spec) in &metadata.fields {
        if spec.required {
            push!(NotNullRule::new(format!("{column}_required"), column));
        }
        if let Some(field_type) = spec.field_type {
            push!(TypeRule::new(format!("{column}_type"), column, field_type));
        }
        if let Some(pattern) = &spec.pattern {
            match PatternRule::new(format!("{column}_format"), column, pattern) {
                Ok(rule) => push!(rule),
                Err(e) => warn!("Skipping pattern for '{}': {}", column, e),
            }
        }
        if let Some(allowed) = &spec.allowed_values {
            push!(AllowedValuesRule::new(
                format!("{column}_allowed"),
                column,
                allowed.clone()
            ));
        }
        if spec.min.is_some() || spec.max.is_some() {
            push!(RangeRule::new(format!("{column}_range"), column, spec.min, spec.max));
        }
        if spec.unique {
            push!(UniquenessRule::new(format!("{column}_unique"), column));
        }
        if let Some(days) = spec.max_age_days {
            match max_age(days) {
                Some(max_age) => push!(RecencyRule::new(format!("{column}_recent"), column, max_age)),
                None => warn!("Skipping max_age_days {} for '{}': not a usable age", days, column),
            }
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use crate::dimension::Dimension;
    use serde_json::json;

    fn orders(n: usize) -> Dataset {
        let rows = (0..n)
            .map(|i| {
                let v = json!({
                    "order_id": i,
                    "status": if i % 2 == 0 { "open" } else { "closed" },
                    "amount": 10.5 + i as f64,
                    "note": if i % 3 == 0 { Value::Null } else { json!("n") },
                });
                serde_json::from_value::<Record>(v).unwrap()
            })
            .collect();
        Dataset::from_records(rows)
    }

    #[test]
    fn test_infer_types_and_required() {
        let meta = infer_metadata(&orders(25));
        assert_eq!(meta.fields["order_id"].field_type, Some(FieldType::Integer));
        assert_eq!(meta.fields["amount"].field_type, Some(FieldType::Number));
        assert!(meta.fields["amount"].required);
        assert!(!meta.fields["note"].required);
    }

    #[test]
    fn test_infer_range_and_unique() {
        let meta = infer_metadata(&orders(25));
        let amount = &meta.fields["amount"];
        assert_eq!(amount.min, Some(10.5));
        assert_eq!(amount.max, Some(34.5));
        assert!(meta.fields["order_id"].unique);
    }

    #[test]
    fn test_infer_enum_needs_samples() {
        assert!(infer_metadata(&orders(25)).fields["status"].allowed_values.is_some());
        assert!(infer_metadata(&orders(5)).fields["status"].allowed_values.is_none());
    }

    #[test]
    fn test_inferred_rules_pass_on_source_data() {
        let ds = orders(25);
        let rules = rules_from_metadata(&infer_metadata(&ds), Provenance::Inferred);
        assert!(!rules.is_empty());
        for rule in &rules {
            assert_eq!(rule.provenance(), Provenance::Inferred);
            assert!(rule.evaluate(&ds).unwrap().valid, "{} failed", rule.id());
        }
    }

    #[test]
    fn test_explicit_rules_from_declared_metadata() {
        let mut meta = DatasetMetadata::default();
        meta.fields.insert(
            "email".to_string(),
            FieldSpec {
                required: true,
                pattern: Some(r"^\S+@\S+$".to_string()),
                ..Default::default()
            },
        );
        let rules = rules_from_metadata(&meta, Provenance::Explicit);
        let ids: Vec<&str> = rules.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["email_required", "email_format"]);
        assert_eq!(rules[0].dimension(), Dimension::Completeness);
        assert_eq!(rules[1].provenance(), Provenance::Explicit);
    }

    #[test]
    fn test_unusable_max_age_skipped() {
        for days in [1e8, 1e300, f64::INFINITY, f64::NAN, -1.0] {
            let mut meta = DatasetMetadata::default();
            meta.fields.insert(
                "updated".to_string(),
                FieldSpec {
                    max_age_days: Some(days),
                    ..Default::default()
                },
            );
            let rules = rules_from_metadata(&meta, Provenance::Explicit);
            let ids: Vec<&str> = rules.iter().map(|r| r.id()).collect();
            if days == 1e8 {
                // representable as a duration; the rule itself rejects it
                assert_eq!(ids, vec!["updated_recent"]);
            } else {
                assert!(ids.is_empty(), "kept max_age_days {days}");
            }
        }
        assert_eq!(max_age(1.5), TimeDelta::try_seconds(129_600));
    }

    #[test]
    fn test_bad_pattern_skipped() {
        let mut meta = DatasetMetadata::default();
        meta.fields.insert(
            "code".to_string(),
            FieldSpec {
                pattern: Some("([".to_string()),
                ..Default::default()
            },
        );
        assert!(rules_from_metadata(&meta, Provenance::Explicit).is_empty());
    }
}
