//! Cohort-expression assembly, validation, and structural comparison.
//!
//! Everything here is pure: no network access and no shared state. The control
//! plane feeds it JSON and renders its results.

pub mod assembly;
pub mod compare;
pub mod estimate;
pub mod overlay;
pub mod validation;

pub use assembly::{AssemblyError, CriteriaType, InclusionRuleSpec, OccurrenceType, PrimaryCriteriaSpec};
pub use compare::CohortComparison;
pub use overlay::{Overlay, apply_modifications};
pub use validation::{ValidationReport, validate_expression};

use serde_json::Value;

/// Truthiness of an optional JSON section: null, false, zero, and empty containers are absent.
#[must_use]
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|number| number.abs() > 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Length of a top-level array section, zero when absent or not an array.
#[must_use]
pub fn section_len(expression: &Value, key: &str) -> usize {
    expression
        .get(key)
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Present/missing label used by the cohort summaries.
#[must_use]
pub fn primary_criteria_label(expression: &Value) -> &'static str {
    if is_present(expression.get("PrimaryCriteria")) {
        "Defined"
    } else {
        "Missing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_follows_json_truthiness() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&json!(null))));
        assert!(!is_present(Some(&json!({}))));
        assert!(is_present(Some(&json!({"CriteriaList": []}))));
        assert_eq!(section_len(&json!({"InclusionRules": [{}, {}]}), "InclusionRules"), 2);
        assert_eq!(section_len(&json!({"InclusionRules": null}), "InclusionRules"), 0);
    }
}
