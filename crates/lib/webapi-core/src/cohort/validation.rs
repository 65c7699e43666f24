use std::fmt::{self, Write as _};

use serde::Deserialize;
use serde_json::Value;
use webapi_models::schema::{CohortExpression, LARGE_CONCEPT_SET, LONG_PRIOR_OBSERVATION_DAYS};

/// Outcome of the semantic checks over a schema-conformant expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub concept_sets: usize,
    pub inclusion_rules: usize,
    pub primary_criteria: bool,
    pub total_concepts: usize,
}

impl ValidationReport {
    /// Runs every check; none of them short-circuits another.
    #[must_use]
    pub fn check(expression: &CohortExpression) -> Self {
        let mut report = Self {
            concept_sets: expression.concept_sets.len(),
            inclusion_rules: expression.inclusion_rules.len(),
            primary_criteria: expression.primary_criteria.is_some(),
            total_concepts: expression.total_concepts(),
            ..Self::default()
        };

        if expression.primary_criteria.is_none() {
            report
                .errors
                .push("Missing PrimaryCriteria - cohort must have index events defined".to_string());
        }

        if expression.concept_sets.is_empty() {
            report
                .warnings
                .push("No ConceptSets defined - cohort may not work as expected".to_string());
        }

        for concept_set in &expression.concept_sets {
            let size = concept_set.len();
            if size == 0 {
                report.errors.push(format!(
                    "Concept set '{}' has no concepts defined",
                    concept_set.name
                ));
            }
            if size > LARGE_CONCEPT_SET {
                report.warnings.push(format!(
                    "Concept set '{}' has {size} concepts - consider if this is intended",
                    concept_set.name
                ));
            }
        }

        if let Some(primary) = &expression.primary_criteria {
            if primary.criteria_list.is_empty() {
                report
                    .errors
                    .push("PrimaryCriteria has no CriteriaList defined".to_string());
            }
            if let Some(window) = primary.observation_window
                && window.prior_days > LONG_PRIOR_OBSERVATION_DAYS
            {
                report.warnings.push(format!(
                    "Long prior observation window ({} days) may reduce cohort size",
                    window.prior_days
                ));
            }
        }

        for (index, rule) in expression.inclusion_rules.iter().enumerate() {
            let position = index + 1;
            let name = rule.name.as_deref().filter(|name| !name.is_empty());
            if name.is_none() {
                report
                    .warnings
                    .push(format!("Inclusion rule {position} has no name"));
            }
            if !super::is_present(rule.expression.as_ref()) {
                report.errors.push(name.map_or_else(
                    || format!("Inclusion rule {position} has no expression defined"),
                    |name| format!("Inclusion rule '{name}' has no expression defined"),
                ));
            }
        }

        report
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::from("Cohort Definition Validation Report:\n\n");

        if self.is_clean() {
            text.push_str("✅ Validation PASSED - No issues found\n\n");
        } else {
            if !self.errors.is_empty() {
                let _ = writeln!(text, "❌ ERRORS ({}):", self.errors.len());
                for error in &self.errors {
                    let _ = writeln!(text, "  - {error}");
                }
                text.push('\n');
            }
            if !self.warnings.is_empty() {
                let _ = writeln!(text, "⚠️  WARNINGS ({}):", self.warnings.len());
                for warning in &self.warnings {
                    let _ = writeln!(text, "  - {warning}");
                }
                text.push('\n');
            }
        }

        text.push_str("Cohort Summary:\n");
        let _ = writeln!(text, "  - Concept Sets: {}", self.concept_sets);
        let _ = writeln!(text, "  - Inclusion Rules: {}", self.inclusion_rules);
        let _ = writeln!(
            text,
            "  - Primary Criteria: {}",
            if self.primary_criteria { "Defined" } else { "Missing" }
        );
        let _ = writeln!(text, "  - Total Concepts: {}", self.total_concepts);

        f.write_str(&text)
    }
}

/// Builds the typed expression, then runs the semantic checks.
///
/// # Errors
/// Returns the schema error when the JSON does not describe a cohort expression.
pub fn validate_expression(expression: &Value) -> Result<ValidationReport, serde_json::Error> {
    if !expression.is_object() {
        return Err(serde::de::Error::custom("cohort definition must be a JSON object"));
    }
    let typed = CohortExpression::deserialize(expression)?;
    Ok(ValidationReport::check(&typed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: i64) -> Value {
        json!({
            "concept": {
                "CONCEPT_ID": id,
                "CONCEPT_NAME": format!("Concept {id}"),
                "DOMAIN_ID": "Condition",
                "VOCABULARY_ID": "SNOMED",
                "CONCEPT_CLASS_ID": "Clinical Finding"
            },
            "isExcluded": false,
            "includeDescendants": true,
            "includeMapped": false
        })
    }

    fn complete_expression() -> Value {
        json!({
            "ConceptSets": [{"id": 0, "name": "T2DM", "expression": {"items": [item(201826)]}}],
            "PrimaryCriteria": {
                "CriteriaList": [{"ConditionOccurrence": {"CodesetId": 0}}],
                "ObservationWindow": {"PriorDays": 365, "PostDays": 0},
                "PrimaryCriteriaLimit": {"Type": "First"}
            },
            "InclusionRules": [{"name": "adult", "expression": {"Type": "ALL"}}]
        })
    }

    #[test]
    fn complete_expression_passes_clean() {
        let report = validate_expression(&complete_expression()).expect("expression should parse");
        assert!(report.is_clean(), "unexpected issues: {report:?}");
        let text = report.to_string();
        assert!(text.contains("✅ Validation PASSED - No issues found"));
        assert!(text.contains("  - Primary Criteria: Defined\n"));
        assert!(text.ends_with("  - Total Concepts: 1\n"));
    }

    #[test]
    fn missing_primary_criteria_is_an_error() {
        let report = validate_expression(&json!({"ConceptSets": [], "InclusionRules": []}))
            .expect("expression should parse");
        assert!(!report.passed());
        assert_eq!(
            report.errors,
            vec!["Missing PrimaryCriteria - cohort must have index events defined".to_string()]
        );
        assert_eq!(
            report.warnings,
            vec!["No ConceptSets defined - cohort may not work as expected".to_string()]
        );
        assert!(report.to_string().contains("  - Total Concepts: 0\n"));
    }

    #[test]
    fn smells_accumulate_as_warnings() {
        let items: Vec<Value> = (1..=101).map(item).collect();
        let report = validate_expression(&json!({
            "ConceptSets": [
                {"id": 0, "name": "broad", "expression": {"items": items}},
                {"id": 1, "name": "empty", "expression": {"items": []}}
            ],
            "PrimaryCriteria": {
                "CriteriaList": [],
                "ObservationWindow": {"PriorDays": 730, "PostDays": 0}
            },
            "InclusionRules": [{"expression": {"Type": "ALL"}}, {"name": "blank"}]
        }))
        .expect("expression should parse");

        assert_eq!(
            report.errors,
            vec![
                "Concept set 'empty' has no concepts defined".to_string(),
                "PrimaryCriteria has no CriteriaList defined".to_string(),
                "Inclusion rule 'blank' has no expression defined".to_string(),
            ]
        );
        assert_eq!(
            report.warnings,
            vec![
                "Concept set 'broad' has 101 concepts - consider if this is intended".to_string(),
                "Long prior observation window (730 days) may reduce cohort size".to_string(),
                "Inclusion rule 1 has no name".to_string(),
            ]
        );
        let text = report.to_string();
        assert!(text.contains("❌ ERRORS (3):\n"));
        assert!(text.contains("⚠️  WARNINGS (3):\n"));
    }

    #[test]
    fn hundred_concepts_is_not_a_large_set() {
        let mut expression = complete_expression();
        expression["ConceptSets"][0]["expression"]["items"] = (1..=100).map(item).collect();
        let report = validate_expression(&expression).expect("expression should parse");

        assert!(report.is_clean(), "unexpected issues: {report:?}");
        assert!(report.to_string().ends_with("  - Total Concepts: 100\n"));
    }

    #[test]
    fn schema_mismatch_is_reported_before_checks() {
        assert!(validate_expression(&json!({"ConceptSets": "nope"})).is_err());
        assert!(validate_expression(&json!([1, 2])).is_err());
    }
}
