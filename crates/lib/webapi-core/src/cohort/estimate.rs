//! Static size analysis. Nothing here queries patient data; the text only
//! points at the parts of a definition that drive cohort size.

use std::fmt::Write as _;

use serde_json::Value;

use super::section_len;

/// Per-concept-set counts taken from an expression, in definition order.
#[must_use]
pub fn concept_set_coverage(expression: &Value) -> Vec<(String, usize)> {
    expression
        .get("ConceptSets")
        .and_then(Value::as_array)
        .map(|sets| {
            sets.iter()
                .filter_map(|set| {
                    let items = set.get("expression")?.get("items")?.as_array()?;
                    let name = set.get("name").and_then(Value::as_str).unwrap_or("Unnamed");
                    Some((name.to_string(), items.len()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Renders the size-estimation guidance for a definition on one source.
#[must_use]
pub fn render_size_estimate(source_key: &str, expression: &Value) -> String {
    let definition_len = serde_json::to_string(expression).map_or(0, |encoded| encoded.chars().count());

    let mut text = format!(
        "Cohort Size Estimation:\n\nData Source: {source_key}\nCohort Definition: {definition_len} characters\n\n\
         ⚠️  Note: This is a basic analysis. For accurate size estimates, consider:\n\n\
         1. Concept Set Coverage:\n"
    );

    if expression.get("ConceptSets").is_some() {
        let coverage = concept_set_coverage(expression);
        for (name, count) in &coverage {
            let _ = writeln!(text, "   - '{name}': {count} concepts");
        }
        let total: usize = coverage.iter().map(|(_, count)| count).sum();
        let _ = writeln!(text, "\n   Total concepts: {total}");
    }

    let _ = write!(
        text,
        "\n2. Time Windows:\n\
         \x20  - Broader time windows = larger cohorts\n\
         \x20  - Restrictive windows = smaller cohorts\n\
         \n3. Inclusion Rules:\n\
         \x20  - Each rule further filters the cohort\n\
         \x20  - {} inclusion rules defined\n\
         \n4. Observation Requirements:\n\
         \x20  - Prior observation requirements reduce cohort size\n\
         \x20  - Post observation requirements affect follow-up\n\
         \n💡 For accurate estimates, use WebAPI's cohort generation preview feature \
         or run a test generation on a sample of your data.\n",
        section_len(expression, "InclusionRules")
    );

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coverage_lists_each_concept_set() {
        let expression = json!({
            "ConceptSets": [
                {"name": "T2DM", "expression": {"items": [{}, {}]}},
                {"name": "Metformin", "expression": {"items": [{}]}},
                {"name": "no expression"}
            ],
            "InclusionRules": [{"name": "adult"}]
        });
        let text = render_size_estimate("SYNPUF", &expression);

        assert!(text.starts_with("Cohort Size Estimation:\n\nData Source: SYNPUF\nCohort Definition: "));
        assert!(text.contains("   - 'T2DM': 2 concepts\n   - 'Metformin': 1 concepts\n\n   Total concepts: 3\n"));
        assert!(!text.contains("no expression"));
        assert!(text.contains("   - 1 inclusion rules defined\n"));
        assert!(text.contains("\n2. Time Windows:\n   - Broader time windows = larger cohorts\n"));
    }

    #[test]
    fn missing_sections_skip_coverage_totals() {
        let text = render_size_estimate("EUNOMIA", &json!({}));
        assert!(!text.contains("Total concepts"));
        assert!(text.contains("   - 0 inclusion rules defined\n"));
        assert!(text.contains("Cohort Definition: 2 characters"));
    }
}
